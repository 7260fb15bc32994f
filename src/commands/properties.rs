// src/commands/properties.rs

use super::{Command, CommandContext};
use crate::core::parameters::{ParameterError, ParameterSpec};
use crate::models::ParsedCommand;
use crate::system::engine::EngineFault;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::str::FromStr;

pub const SET_PROPERTY_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("PropertyName"),
    ParameterSpec::required("PropertyValue"),
    ParameterSpec::optional("PropertyType").choices(PropertyType::CHOICES),
];

pub const WRITE_PROPERTIES_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("OutputFile"),
    ParameterSpec::optional("IncludeProperties").scalar_or_list(),
    ParameterSpec::optional("WriteMode").choices(&["Overwrite", "Append"]),
    ParameterSpec::optional("FileFormat").choices(&["NameValue", "JSON"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyType {
    #[default]
    String,
    Boolean,
    Integer,
    Float,
}

impl PropertyType {
    pub const CHOICES: &'static [&'static str] = &["String", "Boolean", "Integer", "Float"];

    /// Checks `value` against the type and returns its canonical text.
    pub fn canonicalize(self, value: &str) -> Result<String, String> {
        let trimmed = value.trim();
        match self {
            Self::String => Ok(value.to_string()),
            Self::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Ok("True".to_string())
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Ok("False".to_string())
                } else {
                    Err("expected True or False".to_string())
                }
            }
            Self::Integer => trimmed
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|_| "expected an integer".to_string()),
            Self::Float => trimmed
                .parse::<f64>()
                .map(|n| n.to_string())
                .map_err(|_| "expected a number".to_string()),
        }
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::String),
            "boolean" => Ok(Self::Boolean),
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            _ => Err(format!("'{}' is not a property type", s)),
        }
    }
}

fn is_valid_property_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '$' | '{' | '}' | '=' | '"'))
}

/// `SetProperty(PropertyName=..., PropertyValue=..., PropertyType=...)`
#[derive(Debug, Default)]
pub struct SetProperty;

impl Command for SetProperty {
    fn validate(&mut self, parameters: &ParsedCommand) -> Result<(), ParameterError> {
        let name = parameters.scalar("PropertyName").unwrap_or_default();
        if !name.contains("${") && !is_valid_property_name(name.trim()) {
            return Err(ParameterError::InvalidValue {
                name: "PropertyName".to_string(),
                value: name.to_string(),
                reason: "property names cannot contain spaces, quotes, '=', '$' or braces"
                    .to_string(),
            });
        }

        let kind = parameters
            .scalar("PropertyType")
            .and_then(|t| t.parse::<PropertyType>().ok())
            .unwrap_or_default();
        let value = parameters.scalar("PropertyValue").unwrap_or_default();
        if !value.contains("${") {
            kind.canonicalize(value)
                .map_err(|reason| ParameterError::InvalidValue {
                    name: "PropertyValue".to_string(),
                    value: value.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let name = ctx.param_or("PropertyName", "").trim().to_string();
        let value = ctx.param_or("PropertyValue", "");
        let kind = ctx
            .param_or("PropertyType", "String")
            .parse::<PropertyType>()
            .unwrap_or_default();

        if !is_valid_property_name(&name) {
            ctx.fail(
                format!("'{}' is not a valid property name.", name),
                "Use a name without spaces, quotes, '=', '$' or braces.",
            );
            return Ok(());
        }

        match kind.canonicalize(&value) {
            Ok(canonical) => {
                log::debug!("SetProperty {}={}", name, canonical);
                ctx.session.set_property(name, canonical);
            }
            Err(reason) => ctx.fail(
                format!("Invalid value '{}' for property '{}': {}.", value, name, reason),
                format!("Specify a value of type {:?}.", kind),
            ),
        }
        Ok(())
    }
}

/// `WritePropertiesToFile(OutputFile=..., IncludeProperties=[...], WriteMode=..., FileFormat=...)`
#[derive(Debug, Default)]
pub struct WritePropertiesToFile;

impl WritePropertiesToFile {
    fn render_name_value(properties: &BTreeMap<String, String>) -> String {
        properties
            .iter()
            .map(|(name, value)| {
                format!("{}=\"{}\"\n", name, value.replace('\\', "\\\\").replace('"', "\\\""))
            })
            .collect()
    }
}

impl Command for WritePropertiesToFile {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let output = ctx.param_or("OutputFile", "");
        let path = ctx.resolve_path(&output);
        let append = ctx.param_or("WriteMode", "Overwrite").eq_ignore_ascii_case("Append");
        let json = ctx.param_or("FileFormat", "NameValue").eq_ignore_ascii_case("JSON");

        let mut selected = BTreeMap::new();
        match ctx.list_param("IncludeProperties").filter(|names| !names.is_empty()) {
            Some(names) => {
                for name in names {
                    match ctx.session.get_property(&name) {
                        Some(value) => {
                            selected.insert(name, value.to_string());
                        }
                        None => ctx.warn(
                            format!("Property '{}' is not defined and was not written.", name),
                            "Check the IncludeProperties names.",
                        ),
                    }
                }
            }
            None => {
                for (name, value) in ctx.session.properties.iter() {
                    selected.insert(name.to_string(), value.to_string());
                }
            }
        }

        let content = if json {
            let mut text = if append {
                serde_json::to_string(&selected)?
            } else {
                serde_json::to_string_pretty(&selected)?
            };
            text.push('\n');
            text
        } else {
            Self::render_name_value(&selected)
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)?;
        file.write_all(content.as_bytes())?;

        log::info!("Wrote {} properties to '{}'", selected.len(), path.display());
        Ok(())
    }
}
