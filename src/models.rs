// src/models.rs

use crate::core::parser::ParseError;
use serde::Serialize;
use std::fmt;

// --- PARSED COMMAND MODELS ---
// Built once per script line by the parser and never mutated afterwards.

/// The value of a single `Name=Value` parameter, decided once at parse time.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ParameterValue {
    /// `Name=value` or `Name="value"`.
    Scalar(String),
    /// `Name=[v1, "v2", 'v,3']`.
    List(Vec<String>),
}

impl ParameterValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Scalar(_) => None,
            Self::List(items) => Some(items),
        }
    }
}

/// One command from a script line: its name plus ordered, uniquely named parameters.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    parameters: Vec<(String, ParameterValue)>,
}

impl ParsedCommand {
    /// Creates a command with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    /// Builder used by tests and by programmatic callers.
    pub fn with_scalar(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name.into(), ParameterValue::Scalar(value.into()));
        self
    }

    pub fn with_list<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items = values.into_iter().map(Into::into).collect();
        self.insert(name.into(), ParameterValue::List(items));
        self
    }

    /// Inserts a parameter, returning `false` if the name is already taken.
    pub(crate) fn insert(&mut self, name: String, value: ParameterValue) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.parameters.push((name, value));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parameters.iter().any(|(n, _)| n == name)
    }

    /// Looks up a parameter by name; declaration order is irrelevant.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn scalar(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParameterValue::as_scalar)
    }

    pub fn list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(ParameterValue::as_list)
    }

    /// Parameters in the order they appeared on the line.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.parameters.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Quotes a value so that the parser reads it back unchanged.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

impl fmt::Display for ParsedCommand {
    /// Serializes back to `Name(P1="v1",P2=["a","b"])`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = self
            .parameters
            .iter()
            .map(|(name, value)| match value {
                ParameterValue::Scalar(s) => format!("{}={}", name, quote(s)),
                ParameterValue::List(items) => {
                    let quoted: Vec<String> = items.iter().map(|i| quote(i)).collect();
                    format!("{}=[{}]", name, quoted.join(","))
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}({})", self.name, params)
    }
}

// --- SCRIPT MODELS ---

/// A non-blank, non-comment line of a command file.
#[derive(Debug, Clone)]
pub struct ScriptLine {
    /// 1-based line number in the source file (0 for lines without a file).
    pub number: usize,
    /// The raw line text, trimmed.
    pub text: String,
    pub parsed: Result<ParsedCommand, ParseError>,
}

/// An ordered command stream, as read from a command file or typed interactively.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub lines: Vec<ScriptLine>,
}

impl Script {
    /// Wraps already-parsed commands; line numbers follow list order.
    pub fn from_commands(commands: Vec<ParsedCommand>) -> Self {
        let lines = commands
            .into_iter()
            .enumerate()
            .map(|(i, cmd)| ScriptLine {
                number: i + 1,
                text: cmd.to_string(),
                parsed: Ok(cmd),
            })
            .collect();
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
