// src/commands/message.rs

use super::{Command, CommandContext};
use crate::core::parameters::ParameterSpec;
use crate::core::status::Severity;
use crate::system::engine::EngineFault;

pub const MESSAGE_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Message"),
    ParameterSpec::optional("CommandStatus").choices(&["Success", "Warning", "Failure"]),
];

/// `Message(Message="...", CommandStatus=Warning)`: records the expanded message at the
/// requested severity. Used to flag conditions from inside `If` blocks.
#[derive(Debug, Default)]
pub struct Message;

impl Command for Message {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let text = ctx.param_or("Message", "");
        let requested = ctx.param_or("CommandStatus", "Success");
        let severity = match requested.parse::<Severity>() {
            Ok(Severity::Unknown) | Err(_) => {
                ctx.fail(
                    format!("'{}' is not a valid CommandStatus.", requested),
                    "Specify CommandStatus as Success, Warning or Failure.",
                );
                return Ok(());
            }
            Ok(severity) => severity,
        };

        let recommendation = match severity {
            Severity::Success => "",
            _ => "Review the message.",
        };
        ctx.record(severity, text, recommendation);
        Ok(())
    }
}
