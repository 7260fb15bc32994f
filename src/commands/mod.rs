// src/commands/mod.rs

//! # Commands
//!
//! Each script line names a command from the static `COMMAND_REGISTRY`. The processor
//! builds a fresh instance per line, validates it once and then drives its `discover` and
//! `execute` hooks through a `CommandContext`.

use crate::core::parameters::{ParameterError, ParameterSpec};
use crate::core::registry::{self, IdCollisionPolicy};
use crate::core::session::Session;
use crate::core::status::{CommandStatus, Phase, Severity};
use crate::models::{ParameterValue, ParsedCommand};
use crate::system::engine::{EngineFault, Layer};
use std::path::PathBuf;

pub mod control;
pub mod layers;
pub mod message;
pub mod properties;

/// What the processor should do after a command's `execute`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    /// Go on with the next line.
    #[default]
    Continue,
    /// Resume after the line that closes this block (`If` false, `For` exhausted).
    SkipBlock,
    /// Go back to the line that opened this block (`EndFor`).
    JumpBack,
    /// Stop the run.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    For,
}

/// Whether a command opens or closes a `Name`-matched block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRole {
    Open(BlockKind),
    Close(BlockKind),
}

/// A command implementation. One instance exists per script line and lives for the whole
/// run, so state kept in `self` survives loop passes.
pub trait Command {
    /// Command-specific checks run after the generic parameter validation passed.
    /// Values are unexpanded here; checks must tolerate `${...}` references.
    fn validate(&mut self, _parameters: &ParsedCommand) -> Result<(), ParameterError> {
        Ok(())
    }

    /// Probes prior state (usually referenced layers). A FAILURE recorded here prevents
    /// `execute` for this pass.
    fn discover(&mut self, _ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault>;
}

/// Defines a script command: its name, accepted parameters and constructor.
#[derive(Debug)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub summary: &'static str,
    pub parameters: &'static [ParameterSpec],
    pub block: Option<BlockRole>,
    pub constructor: fn() -> Box<dyn Command>,
}

fn construct<C: Command + Default + 'static>() -> Box<dyn Command> {
    Box::new(C::default())
}

/// The single source of truth for all script commands.
pub static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "SetProperty",
        summary: "Set a processor property.",
        parameters: properties::SET_PROPERTY_PARAMETERS,
        block: None,
        constructor: construct::<properties::SetProperty>,
    },
    CommandDefinition {
        name: "WritePropertiesToFile",
        summary: "Write processor properties to a file.",
        parameters: properties::WRITE_PROPERTIES_PARAMETERS,
        block: None,
        constructor: construct::<properties::WritePropertiesToFile>,
    },
    CommandDefinition {
        name: "Message",
        summary: "Log a message with a chosen severity.",
        parameters: message::MESSAGE_PARAMETERS,
        block: None,
        constructor: construct::<message::Message>,
    },
    CommandDefinition {
        name: "ReadLayer",
        summary: "Read a layer from a file.",
        parameters: layers::READ_LAYER_PARAMETERS,
        block: None,
        constructor: construct::<layers::ReadLayer>,
    },
    CommandDefinition {
        name: "WriteLayer",
        summary: "Write a layer to a file.",
        parameters: layers::WRITE_LAYER_PARAMETERS,
        block: None,
        constructor: construct::<layers::WriteLayer>,
    },
    CommandDefinition {
        name: "CopyLayer",
        summary: "Copy a layer under a new ID.",
        parameters: layers::COPY_LAYER_PARAMETERS,
        block: None,
        constructor: construct::<layers::CopyLayer>,
    },
    CommandDefinition {
        name: "MergeLayers",
        summary: "Merge layers into a new layer.",
        parameters: layers::MERGE_LAYERS_PARAMETERS,
        block: None,
        constructor: construct::<layers::MergeLayers>,
    },
    CommandDefinition {
        name: "FreeLayer",
        summary: "Remove layers from the session.",
        parameters: layers::FREE_LAYER_PARAMETERS,
        block: None,
        constructor: construct::<layers::FreeLayer>,
    },
    CommandDefinition {
        name: "If",
        summary: "Run the following block only when a condition holds.",
        parameters: control::IF_PARAMETERS,
        block: Some(BlockRole::Open(BlockKind::If)),
        constructor: construct::<control::If>,
    },
    CommandDefinition {
        name: "EndIf",
        summary: "Close an If block.",
        parameters: control::END_BLOCK_PARAMETERS,
        block: Some(BlockRole::Close(BlockKind::If)),
        constructor: construct::<control::EndIf>,
    },
    CommandDefinition {
        name: "For",
        summary: "Repeat the following block for each value.",
        parameters: control::FOR_PARAMETERS,
        block: Some(BlockRole::Open(BlockKind::For)),
        constructor: construct::<control::For>,
    },
    CommandDefinition {
        name: "EndFor",
        summary: "Close a For block.",
        parameters: control::END_BLOCK_PARAMETERS,
        block: Some(BlockRole::Close(BlockKind::For)),
        constructor: construct::<control::EndFor>,
    },
    CommandDefinition {
        name: "Exit",
        summary: "Stop processing commands.",
        parameters: &[],
        block: None,
        constructor: construct::<control::Exit>,
    },
];

/// Finds a command definition by name, ignoring case.
pub fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name.eq_ignore_ascii_case(name.trim()))
}

/// Everything a command may touch during one phase of one pass.
#[derive(Debug)]
pub struct CommandContext<'a> {
    pub session: &'a mut Session,
    pub status: &'a mut CommandStatus,
    pub parameters: &'a ParsedCommand,
    pub phase: Phase,
    /// Script line number, for log messages.
    pub line: usize,
    flow: Flow,
    worst: Severity,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        session: &'a mut Session,
        status: &'a mut CommandStatus,
        parameters: &'a ParsedCommand,
        phase: Phase,
        line: usize,
    ) -> Self {
        Self {
            session,
            status,
            parameters,
            phase,
            line,
            flow: Flow::Continue,
            worst: Severity::Unknown,
        }
    }

    pub fn record(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) {
        let message = message.into();
        log_record(self.line, self.phase, severity, &message);
        self.worst = self.worst.max(severity);
        self.status
            .add_record(self.phase, severity, message, recommendation);
    }

    pub fn warn(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        self.record(Severity::Warning, message, recommendation);
    }

    pub fn fail(&mut self, message: impl Into<String>, recommendation: impl Into<String>) {
        self.record(Severity::Failure, message, recommendation);
    }

    /// Highest severity recorded through this context.
    pub fn worst_recorded(&self) -> Severity {
        self.worst
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn set_flow(&mut self, flow: Flow) {
        self.flow = flow;
    }

    /// Unresolved names are reported in RUN only, once per pass.
    fn expand_value(&mut self, parameter: &str, raw: &str) -> String {
        let expansion = self.session.expand(raw);
        if self.phase != Phase::Run {
            return expansion.text;
        }
        for name in &expansion.unresolved {
            self.warn(
                format!("Property '{}' used by {} is not defined.", name, parameter),
                "Set the property before this command or check its spelling.",
            );
        }
        expansion.text
    }

    /// The expanded scalar value of a parameter.
    pub fn param(&mut self, name: &str) -> Option<String> {
        let parameters = self.parameters;
        let raw = parameters.scalar(name)?;
        Some(self.expand_value(name, raw))
    }

    /// Like `param`, with `default` for absent or empty values.
    pub fn param_or(&mut self, name: &str, default: &str) -> String {
        self.param(name)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    /// The expanded items of a parameter. A scalar is read as a comma-separated list.
    pub fn list_param(&mut self, name: &str) -> Option<Vec<String>> {
        let parameters = self.parameters;
        match parameters.get(name)? {
            ParameterValue::List(items) => {
                Some(items.iter().map(|i| self.expand_value(name, i)).collect())
            }
            ParameterValue::Scalar(text) => {
                let expanded = self.expand_value(name, text);
                Some(
                    expanded
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }
        }
    }

    /// Reads `IfIDExists`, defaulting to `Replace`. Records a FAILURE when the expanded
    /// value is not a policy.
    pub fn collision_policy(&mut self) -> Option<IdCollisionPolicy> {
        let raw = self.param_or("IfIDExists", "Replace");
        match raw.parse() {
            Ok(policy) => Some(policy),
            Err(e) => {
                self.fail(
                    e.to_string(),
                    format!(
                        "Specify IfIDExists as one of: {}.",
                        IdCollisionPolicy::CHOICES.join(", ")
                    ),
                );
                None
            }
        }
    }

    pub fn resolve_path(&self, path: &str) -> PathBuf {
        self.session.resolve_path(path)
    }

    /// Records a FAILURE unless layer `id` exists.
    pub fn require_layer(&mut self, id: &str) -> bool {
        if self.session.layers.exists(id) {
            return true;
        }
        self.fail(
            format!("Layer '{}' does not exist.", id),
            "Read or create the layer before this command.",
        );
        false
    }

    /// Installs a layer under `id` following `policy`.
    pub fn put_layer(&mut self, id: &str, layer: Layer, policy: IdCollisionPolicy) -> bool {
        let before = self.status.records(self.phase).len();
        let installed = registry::put_with_policy(
            &mut self.session.layers,
            id,
            layer,
            policy,
            self.status,
            self.phase,
        );
        let added: Vec<(Severity, String)> = self
            .status
            .records(self.phase)
            .iter()
            .skip(before)
            .map(|r| (r.severity, r.message.clone()))
            .collect();
        for (severity, message) in added {
            log_record(self.line, self.phase, severity, &message);
            self.worst = self.worst.max(severity);
        }
        installed
    }
}

/// Mirrors a status record into the log.
pub(crate) fn log_record(line: usize, phase: Phase, severity: Severity, message: &str) {
    match severity {
        Severity::Failure => log::error!("Line {} [{}]: {}", line, phase, message),
        Severity::Warning => log::warn!("Line {} [{}]: {}", line, phase, message),
        _ => log::info!("Line {} [{}]: {}", line, phase, message),
    }
}
