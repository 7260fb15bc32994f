// src/core/parameters.rs

//! # Parameter Specifications
//!
//! Every command declares the parameters it accepts as a static slice of `ParameterSpec`.
//! `validate_parameters` runs the checks common to all commands during INITIALIZATION;
//! anything command-specific (numeric ranges, conditional requirements) stays with the
//! command itself.

use crate::models::{ParameterValue, ParsedCommand};
use thiserror::Error;

/// Which value forms a parameter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterShape {
    Scalar,
    List,
    /// Either form; commands normalize with `CommandContext::list_param`.
    Either,
}

/// Static description of one accepted parameter.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub required: bool,
    pub shape: ParameterShape,
    /// Accepted values, compared case-insensitively. Empty means free text.
    pub choices: &'static [&'static str],
}

impl ParameterSpec {
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            shape: ParameterShape::Scalar,
            choices: &[],
        }
    }

    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            shape: ParameterShape::Scalar,
            choices: &[],
        }
    }

    pub const fn list(self) -> Self {
        Self {
            shape: ParameterShape::List,
            ..self
        }
    }

    pub const fn scalar_or_list(self) -> Self {
        Self {
            shape: ParameterShape::Either,
            ..self
        }
    }

    pub const fn choices(self, choices: &'static [&'static str]) -> Self {
        Self { choices, ..self }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("Unknown parameter '{name}'.")]
    Unknown { name: String, valid: Vec<&'static str> },

    #[error("Missing required parameter '{0}'.")]
    Missing(&'static str),

    #[error("Parameter '{0}' expects a single value, not a list.")]
    ExpectedScalar(&'static str),

    #[error("Parameter '{0}' expects a list, e.g. {0}=[a,b].")]
    ExpectedList(&'static str),

    #[error("Invalid value '{value}' for parameter '{name}'.")]
    InvalidChoice {
        name: &'static str,
        value: String,
        choices: &'static [&'static str],
    },

    #[error("Invalid value '{value}' for parameter '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// Cross-parameter constraint violated (e.g. two mutually exclusive parameters).
    #[error("{message}")]
    Conflict { message: String, recommendation: String },
}

impl ParameterError {
    /// Actionable advice recorded alongside the error.
    pub fn recommendation(&self) -> String {
        match self {
            Self::Unknown { valid, .. } if valid.is_empty() => {
                "This command does not take parameters.".to_string()
            }
            Self::Unknown { valid, .. } => format!("Valid parameters are: {}.", valid.join(", ")),
            Self::Missing(name) => format!("Specify the {} parameter.", name),
            Self::ExpectedScalar(name) => format!("Give {} a single value.", name),
            Self::ExpectedList(name) => format!("Enclose the {} values in brackets.", name),
            Self::InvalidChoice { name, choices, .. } => {
                format!("Specify {} as one of: {}.", name, choices.join(", "))
            }
            Self::InvalidValue { name, .. } => format!("Correct the {} parameter.", name),
            Self::Conflict { recommendation, .. } => recommendation.clone(),
        }
    }
}

/// Runs the generic checks of `specs` against `command`, returning every violation found.
///
/// Checks: unknown names, required presence (an empty scalar counts as missing), value
/// shape, and choice membership. Values still holding a `${...}` reference skip the
/// choice check since their final value is only known at run time.
pub fn validate_parameters(
    command: &ParsedCommand,
    specs: &[ParameterSpec],
) -> Vec<ParameterError> {
    let mut errors = Vec::new();

    for (name, _) in command.iter() {
        if !specs.iter().any(|s| s.name == name) {
            errors.push(ParameterError::Unknown {
                name: name.to_string(),
                valid: specs.iter().map(|s| s.name).collect(),
            });
        }
    }

    for spec in specs {
        let Some(value) = command.get(spec.name) else {
            if spec.required {
                errors.push(ParameterError::Missing(spec.name));
            }
            continue;
        };

        match (spec.shape, value) {
            (ParameterShape::Scalar, ParameterValue::List(_)) => {
                errors.push(ParameterError::ExpectedScalar(spec.name));
                continue;
            }
            (ParameterShape::List, ParameterValue::Scalar(_)) => {
                errors.push(ParameterError::ExpectedList(spec.name));
                continue;
            }
            _ => {}
        }

        if let ParameterValue::Scalar(text) = value {
            if spec.required && text.trim().is_empty() {
                errors.push(ParameterError::Missing(spec.name));
                continue;
            }
            if !spec.choices.is_empty()
                && !text.contains("${")
                && !spec.choices.iter().any(|c| c.eq_ignore_ascii_case(text.trim()))
            {
                errors.push(ParameterError::InvalidChoice {
                    name: spec.name,
                    value: text.clone(),
                    choices: spec.choices,
                });
            }
        }
    }

    errors
}
