// src/commands/control.rs

//! Block and flow commands. Block partners are matched by `Name` before the run starts;
//! these commands only tell the processor where to go next through `Flow`.

use super::{Command, CommandContext, Flow};
use crate::core::parameters::{ParameterError, ParameterSpec};
use crate::models::ParsedCommand;
use crate::system::engine::EngineFault;
use std::cmp::Ordering;

pub const IF_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Name"),
    ParameterSpec::required("Condition"),
    ParameterSpec::optional("CompareAsStrings").choices(&["True", "False"]),
];

pub const FOR_PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required("Name"),
    ParameterSpec::optional("IteratorProperty"),
    ParameterSpec::optional("ListValues").scalar_or_list(),
    ParameterSpec::optional("SequenceStart"),
    ParameterSpec::optional("SequenceEnd"),
    ParameterSpec::optional("SequenceIncrement"),
];

pub const END_BLOCK_PARAMETERS: &[ParameterSpec] = &[ParameterSpec::required("Name")];

// --- CONDITIONS ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
}

/// Symbolic operators, longest first so `<=` wins over `<` at the same position.
const SYMBOLS: &[(&str, Operator)] = &[
    ("==", Operator::Equal),
    ("!=", Operator::NotEqual),
    ("<=", Operator::LessOrEqual),
    (">=", Operator::GreaterOrEqual),
    ("<", Operator::Less),
    (">", Operator::Greater),
];

/// A parsed `Left Op Right` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub left: String,
    pub operator: Operator,
    pub right: String,
}

fn strip_quotes(operand: &str) -> String {
    let trimmed = operand.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

impl Condition {
    /// Splits on the leftmost operator. `contains` must be surrounded by whitespace.
    pub fn parse(text: &str) -> Result<Self, String> {
        let lowered = text.to_ascii_lowercase();
        let mut found: Option<(usize, usize, Operator)> = None;

        for (index, _) in text.char_indices() {
            let rest = text.get(index..).unwrap_or_default();
            if let Some((symbol, op)) = SYMBOLS.iter().find(|(s, _)| rest.starts_with(s)) {
                found = Some((index, symbol.len(), *op));
                break;
            }
            let at_word = lowered
                .get(index..)
                .is_some_and(|r| r.starts_with(" contains "));
            if at_word {
                found = Some((index, " contains ".len(), Operator::Contains));
                break;
            }
        }

        let (index, width, operator) =
            found.ok_or_else(|| format!("no operator found in '{}'", text.trim()))?;
        let left = text.get(..index).unwrap_or_default();
        let right = text.get(index + width..).unwrap_or_default();
        if left.trim().is_empty() {
            return Err(format!("missing left operand in '{}'", text.trim()));
        }
        Ok(Self {
            left: strip_quotes(left),
            operator,
            right: strip_quotes(right),
        })
    }

    /// Numeric comparison when both sides are numbers, unless `as_strings` is set.
    pub fn evaluate(&self, as_strings: bool) -> bool {
        if self.operator == Operator::Contains {
            return self.left.contains(&self.right);
        }

        let numeric = if as_strings {
            None
        } else {
            match (self.left.trim().parse::<f64>(), self.right.trim().parse::<f64>()) {
                (Ok(l), Ok(r)) => l.partial_cmp(&r),
                _ => None,
            }
        };
        let ordering = numeric.unwrap_or_else(|| self.left.cmp(&self.right));

        match self.operator {
            Operator::Equal => ordering == Ordering::Equal,
            Operator::NotEqual => ordering != Ordering::Equal,
            Operator::Less => ordering == Ordering::Less,
            Operator::LessOrEqual => ordering != Ordering::Greater,
            Operator::Greater => ordering == Ordering::Greater,
            Operator::GreaterOrEqual => ordering != Ordering::Less,
            Operator::Contains => false,
        }
    }
}

// --- COMMANDS ---

/// `If(Name=..., Condition="${A} > 3", CompareAsStrings=False)`
#[derive(Debug, Default)]
pub struct If;

impl Command for If {
    fn validate(&mut self, parameters: &ParsedCommand) -> Result<(), ParameterError> {
        let condition = parameters.scalar("Condition").unwrap_or_default();
        if condition.contains("${") {
            return Ok(());
        }
        Condition::parse(condition).map_err(|reason| ParameterError::InvalidValue {
            name: "Condition".to_string(),
            value: condition.to_string(),
            reason,
        })?;
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        let text = ctx.param_or("Condition", "");
        let as_strings = ctx
            .param_or("CompareAsStrings", "False")
            .eq_ignore_ascii_case("true");

        let holds = match Condition::parse(&text) {
            Ok(condition) => condition.evaluate(as_strings),
            Err(reason) => {
                ctx.fail(
                    format!("Cannot evaluate condition: {}.", reason),
                    "Write the condition as: Left Operator Right.",
                );
                false
            }
        };
        log::debug!("Line {}: If '{}' is {}", ctx.line, text, holds);
        if !holds {
            ctx.set_flow(Flow::SkipBlock);
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct EndIf;

impl Command for EndIf {
    fn execute(&mut self, _ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        Ok(())
    }
}

#[derive(Debug)]
struct ForState {
    values: Vec<String>,
    next: usize,
}

/// `For(Name=..., IteratorProperty=..., ListValues=[...])` or with
/// `SequenceStart/SequenceEnd/SequenceIncrement`. The values are computed on entry and
/// discarded when the loop ends, so an enclosing loop starts it afresh.
#[derive(Debug, Default)]
pub struct For {
    state: Option<ForState>,
}

/// Upper bound on the values a numeric `For` sequence may produce.
pub const MAX_SEQUENCE_VALUES: u32 = 100_000;

fn parse_number(name: &'static str, value: &str) -> Result<f64, ParameterError> {
    let invalid = |reason: &str| ParameterError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let number = value
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid("expected a number"))?;
    if !number.is_finite() {
        return Err(invalid("expected a finite number"));
    }
    Ok(number)
}

/// Expands a numeric sequence. Integer inputs produce integer text.
pub fn sequence(
    start: &str,
    end: &str,
    increment: Option<&str>,
) -> Result<Vec<String>, ParameterError> {
    let integers = [Some(start), Some(end), increment]
        .iter()
        .flatten()
        .all(|v| v.trim().parse::<i64>().is_ok());

    let first = parse_number("SequenceStart", start)?;
    let last = parse_number("SequenceEnd", end)?;
    let step = match increment {
        Some(text) => parse_number("SequenceIncrement", text)?,
        None if last < first => -1.0,
        None => 1.0,
    };
    if step == 0.0 || (last - first) * step < 0.0 {
        return Err(ParameterError::InvalidValue {
            name: "SequenceIncrement".to_string(),
            value: step.to_string(),
            reason: "the increment does not move from SequenceStart toward SequenceEnd".to_string(),
        });
    }

    let count = ((last - first) / step + 1e-9).floor() + 1.0;
    if !count.is_finite() || count > f64::from(MAX_SEQUENCE_VALUES) {
        return Err(ParameterError::InvalidValue {
            name: "SequenceEnd".to_string(),
            value: end.to_string(),
            reason: format!("the sequence would exceed {} values", MAX_SEQUENCE_VALUES),
        });
    }

    let mut values = Vec::new();
    let mut i = 0.0;
    while i < count {
        let value = first + i * step;
        values.push(if integers {
            format!("{:.0}", value)
        } else {
            value.to_string()
        });
        i += 1.0;
    }
    Ok(values)
}

impl For {
    fn values(ctx: &mut CommandContext<'_>) -> Result<Vec<String>, ParameterError> {
        if let Some(list) = ctx.list_param("ListValues") {
            return Ok(list);
        }
        let start = ctx.param_or("SequenceStart", "");
        let end = ctx.param_or("SequenceEnd", "");
        let increment = ctx.param("SequenceIncrement").filter(|v| !v.trim().is_empty());
        sequence(&start, &end, increment.as_deref())
    }
}

impl Command for For {
    fn validate(&mut self, parameters: &ParsedCommand) -> Result<(), ParameterError> {
        let has_list = parameters.contains("ListValues");
        let has_start = parameters.contains("SequenceStart");
        let has_end = parameters.contains("SequenceEnd");

        let conflict = |message: &str| ParameterError::Conflict {
            message: message.to_string(),
            recommendation: "Specify ListValues, or SequenceStart and SequenceEnd.".to_string(),
        };
        if has_list && (has_start || has_end) {
            return Err(conflict("ListValues cannot be combined with a sequence."));
        }
        if !has_list && !(has_start && has_end) {
            return Err(conflict("No loop values given."));
        }

        if has_start {
            let start = parameters.scalar("SequenceStart").unwrap_or_default();
            let end = parameters.scalar("SequenceEnd").unwrap_or_default();
            let increment = parameters.scalar("SequenceIncrement");
            let deferred = [Some(start), Some(end), increment]
                .iter()
                .flatten()
                .any(|v| v.contains("${"));
            if !deferred {
                sequence(start, end, increment)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        if self.state.is_none() {
            match Self::values(ctx) {
                Ok(values) => self.state = Some(ForState { values, next: 0 }),
                Err(e) => {
                    ctx.fail(e.to_string(), e.recommendation());
                    ctx.set_flow(Flow::SkipBlock);
                    return Ok(());
                }
            }
        }

        let Some(state) = self.state.as_mut() else {
            return Ok(());
        };
        match state.values.get(state.next) {
            Some(value) => {
                let name = ctx.param_or("Name", "");
                let iterator = ctx.param_or("IteratorProperty", &name);
                log::debug!("Line {}: For '{}' {}={}", ctx.line, name, iterator, value);
                ctx.session.set_property(iterator, value.clone());
                state.next += 1;
            }
            None => {
                self.state = None;
                ctx.set_flow(Flow::SkipBlock);
            }
        }
        Ok(())
    }
}

/// Closes a `For` block and sends the processor back to it.
#[derive(Debug, Default)]
pub struct EndFor;

impl Command for EndFor {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        ctx.set_flow(Flow::JumpBack);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Exit;

impl Command for Exit {
    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Result<(), EngineFault> {
        log::info!("Exit() at line {}; remaining commands are not run.", ctx.line);
        ctx.set_flow(Flow::Exit);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::run_command;
    use crate::core::session::Session;

    fn eval(text: &str) -> bool {
        Condition::parse(text).unwrap().evaluate(false)
    }

    #[test]
    fn test_condition_parsing() {
        let c = Condition::parse(r#" "a b" <= 3 "#).unwrap();
        assert_eq!(c.left, "a b");
        assert_eq!(c.operator, Operator::LessOrEqual);
        assert_eq!(c.right, "3");

        let contains = Condition::parse("roads_2024 CONTAINS 2024").unwrap();
        assert_eq!(contains.operator, Operator::Contains);

        assert!(Condition::parse("just text").is_err());
        assert!(Condition::parse("== 3").is_err());
    }

    #[test]
    fn test_numeric_and_string_comparison() {
        assert!(eval("10 > 9"));
        assert!(eval("1.0 == 1"));
        assert!(eval("abc < abd"));
        assert!(eval("x != y"));
        assert!(eval("roads_2024 contains 2024"));
        // As strings, "10" sorts before "9".
        assert!(Condition::parse("10 < 9").unwrap().evaluate(true));
    }

    #[test]
    fn test_sequence_generation() {
        assert_eq!(sequence("1", "3", None).unwrap(), vec!["1", "2", "3"]);
        assert_eq!(sequence("3", "1", None).unwrap(), vec!["3", "2", "1"]);
        assert_eq!(sequence("0", "1", Some("0.5")).unwrap(), vec!["0", "0.5", "1"]);
        assert_eq!(sequence("0", "10", Some("5")).unwrap(), vec!["0", "5", "10"]);
        assert!(sequence("1", "3", Some("-1")).is_err());
        assert!(sequence("1", "3", Some("0")).is_err());
        assert!(sequence("a", "3", None).is_err());
    }

    #[test]
    fn test_sequence_rejects_non_finite_and_oversized_ranges() {
        assert!(sequence("0", "NaN", None).is_err());
        assert!(sequence("0", "inf", None).is_err());
        assert!(sequence("-inf", "0", None).is_err());
        assert!(sequence("0", "1", Some("NaN")).is_err());
        assert!(sequence("0", "1e12", None).is_err());

        let limit = MAX_SEQUENCE_VALUES.to_string();
        assert_eq!(sequence("1", &limit, None).unwrap().len(), 100_000);
        let over = (MAX_SEQUENCE_VALUES + 1).to_string();
        assert!(sequence("1", &over, None).is_err());
    }

    #[test]
    fn test_for_validation() {
        let mut for_cmd = For::default();
        let both = ParsedCommand::new("For")
            .with_scalar("Name", "L")
            .with_list("ListValues", ["a"])
            .with_scalar("SequenceStart", "1");
        assert!(matches!(for_cmd.validate(&both), Err(ParameterError::Conflict { .. })));

        let neither = ParsedCommand::new("For").with_scalar("Name", "L");
        assert!(for_cmd.validate(&neither).is_err());

        let deferred = ParsedCommand::new("For")
            .with_scalar("Name", "L")
            .with_scalar("SequenceStart", "1")
            .with_scalar("SequenceEnd", "${Count}");
        assert!(for_cmd.validate(&deferred).is_ok());

        let endless = ParsedCommand::new("For")
            .with_scalar("Name", "L")
            .with_scalar("SequenceStart", "0")
            .with_scalar("SequenceEnd", "NaN");
        assert!(matches!(for_cmd.validate(&endless), Err(ParameterError::InvalidValue { .. })));
    }

    #[test]
    fn test_for_iterates_then_skips_and_resets() {
        let mut session = Session::new();
        let mut for_cmd = For::default();
        let cmd = ParsedCommand::new("For")
            .with_scalar("Name", "Loop")
            .with_scalar("IteratorProperty", "Year")
            .with_list("ListValues", ["2023", "2024"]);

        let (_, flow) = run_command(&mut session, &mut for_cmd, &cmd);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(session.get_property("Year"), Some("2023"));

        let (_, flow) = run_command(&mut session, &mut for_cmd, &cmd);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(session.get_property("Year"), Some("2024"));

        let (_, flow) = run_command(&mut session, &mut for_cmd, &cmd);
        assert_eq!(flow, Flow::SkipBlock);
        assert!(for_cmd.state.is_none());

        let (_, flow) = run_command(&mut session, &mut for_cmd, &cmd);
        assert_eq!(flow, Flow::Continue);
        assert_eq!(session.get_property("Year"), Some("2023"));
    }

    #[test]
    fn test_iterator_defaults_to_loop_name() {
        let mut session = Session::new();
        let cmd = ParsedCommand::new("For")
            .with_scalar("Name", "Index")
            .with_scalar("SequenceStart", "5")
            .with_scalar("SequenceEnd", "6");
        run_command(&mut session, &mut For::default(), &cmd);
        assert_eq!(session.get_property("Index"), Some("5"));
    }

    #[test]
    fn test_if_false_skips_block() {
        let mut session = Session::new();
        session.set_property("Count", "2");
        let cmd = ParsedCommand::new("If")
            .with_scalar("Name", "Check")
            .with_scalar("Condition", "${Count} > 5");
        let (_, flow) = run_command(&mut session, &mut If, &cmd);
        assert_eq!(flow, Flow::SkipBlock);

        session.set_property("Count", "7");
        let (_, flow) = run_command(&mut session, &mut If, &cmd);
        assert_eq!(flow, Flow::Continue);
    }

    #[test]
    fn test_end_for_and_exit_flows() {
        let mut session = Session::new();
        let end = ParsedCommand::new("EndFor").with_scalar("Name", "L");
        assert_eq!(run_command(&mut session, &mut EndFor, &end).1, Flow::JumpBack);
        let exit = ParsedCommand::new("Exit");
        assert_eq!(run_command(&mut session, &mut Exit, &exit).1, Flow::Exit);
    }
}
