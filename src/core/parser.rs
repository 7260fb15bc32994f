//! # Parser
//!
//! Turns one command-file line into a `ParsedCommand`:
//!
//! ```text
//! CommandName(Param1="value", Param2=["a", 'b,c'], Param3=value)
//! ```
//!
//! The parameter section is split on commas that sit outside double-quoted spans and
//! outside `[...]` lists. A list opens only when `[` directly follows `=`; inside a list,
//! elements may also be single-quoted so they can carry literal commas. Inside any quoted
//! span a backslash escapes the next character.

use crate::models::{ParameterValue, ParsedCommand, Script, ScriptLine};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Syntax errors for a single line. Columns are 0-based character offsets into the
/// trimmed line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing '(' after the command name.")]
    MissingOpenParen,
    #[error("Missing closing ')'.")]
    MissingCloseParen,
    #[error("Unexpected text after the closing ')': '{0}'.")]
    TrailingText(String),
    #[error("The command name is empty.")]
    EmptyCommandName,
    #[error("'{0}' is not a valid command name.")]
    InvalidCommandName(String),
    #[error("Unterminated quoted string starting at column {0}.")]
    UnterminatedQuote(usize),
    #[error("Unterminated list starting at column {0}.")]
    UnterminatedList(usize),
    #[error("Parameter '{0}' is not of the form Name=Value.")]
    MissingEquals(String),
    #[error("'{0}' is not a valid parameter name.")]
    InvalidParameterName(String),
    #[error("The list value of parameter '{0}' must end with ']'.")]
    MalformedList(String),
    #[error("Parameter '{0}' is specified more than once.")]
    DuplicateParameter(String),
}

impl ParseError {
    /// What the user should do about it, for the FAILURE record.
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::MissingOpenParen | Self::MissingCloseParen | Self::TrailingText(_) => {
                "Use the syntax CommandName(Param=\"Value\", ...)."
            }
            Self::EmptyCommandName | Self::InvalidCommandName(_) => {
                "Start the line with a command name made of letters, digits and underscores."
            }
            Self::UnterminatedQuote(_) => "Close the quoted string, escaping inner quotes as \\\".",
            Self::UnterminatedList(_) | Self::MalformedList(_) => {
                "Write list values as Name=[\"a\", \"b\"]."
            }
            Self::MissingEquals(_) | Self::InvalidParameterName(_) => {
                "Write each parameter as Name=Value, separated by commas."
            }
            Self::DuplicateParameter(_) => "Specify each parameter only once.",
        }
    }
}

// --- LINE PARSER ---

/// Parses a single script line.
///
/// Returns `Ok(None)` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Result<Option<ParsedCommand>, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let (name_part, rest) = trimmed
        .split_once('(')
        .ok_or(ParseError::MissingOpenParen)?;
    let (section, trailing) = rest
        .rsplit_once(')')
        .ok_or(ParseError::MissingCloseParen)?;
    if !trailing.trim().is_empty() {
        return Err(ParseError::TrailingText(trailing.trim().to_string()));
    }

    let name = name_part.trim();
    if name.is_empty() {
        return Err(ParseError::EmptyCommandName);
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(ParseError::InvalidCommandName(name.to_string()));
    }

    let mut command = ParsedCommand::new(name);
    // Columns are reported in characters, relative to the trimmed line.
    let section_offset = name_part.chars().count() + 1;
    for token in split_parameters(section, section_offset)? {
        let (param_name, value) = parse_parameter(&token)?;
        if !command.insert(param_name.clone(), value) {
            return Err(ParseError::DuplicateParameter(param_name));
        }
    }

    log::trace!("Parsed '{}' into {:?}", trimmed, command);
    Ok(Some(command))
}

/// Splits the text between the parentheses into trimmed `Name=Value` tokens.
fn split_parameters(section: &str, offset: usize) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<(char, usize)> = None;
    let mut list_start: Option<usize> = None;
    let mut chars = section.chars().enumerate();

    while let Some((pos, c)) = chars.next() {
        if let Some((q, _)) = quote {
            current.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    current.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' => {
                quote = Some(('"', offset + pos));
                current.push(c);
            }
            // Single quotes only delimit strings inside a list.
            '\'' if list_start.is_some() => {
                quote = Some(('\'', offset + pos));
                current.push(c);
            }
            '[' if list_start.is_none() && current.trim_end().ends_with('=') => {
                list_start = Some(offset + pos);
                current.push(c);
            }
            ']' if list_start.is_some() => {
                list_start = None;
                current.push(c);
            }
            ',' if list_start.is_none() => tokens.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if let Some((_, column)) = quote {
        return Err(ParseError::UnterminatedQuote(column));
    }
    if let Some(column) = list_start {
        return Err(ParseError::UnterminatedList(column));
    }
    tokens.push(current);

    // Empty tokens come from an empty section or a stray trailing comma.
    Ok(tokens
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// Parses a `Name=Value` or `Name=[v1, v2]` token.
fn parse_parameter(token: &str) -> Result<(String, ParameterValue), ParseError> {
    let (name, raw_value) = token
        .split_once('=')
        .ok_or_else(|| ParseError::MissingEquals(token.to_string()))?;
    let name = name.trim();
    if !IDENTIFIER_RE.is_match(name) {
        return Err(ParseError::InvalidParameterName(name.to_string()));
    }

    let raw_value = raw_value.trim();
    let value = match raw_value.strip_prefix('[') {
        Some(rest) => {
            let inner = rest
                .strip_suffix(']')
                .ok_or_else(|| ParseError::MalformedList(name.to_string()))?;
            ParameterValue::List(split_list(inner))
        }
        None => ParameterValue::Scalar(unquote(raw_value, &['"'])),
    };

    Ok((name.to_string(), value))
}

/// Splits list contents on commas outside single- or double-quoted elements.
fn split_list(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    quote = Some(c);
                    current.push(c);
                }
                ',' => items.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    items.push(current);

    // `["a", "b",]` has a trailing comma before the closing bracket.
    if items.last().is_some_and(|s| s.trim().is_empty()) {
        items.pop();
    }

    items
        .iter()
        .map(|item| unquote(item.trim(), &['"', '\'']))
        .collect()
}

/// Strips one pair of matching surrounding quotes and resolves escapes inside them.
/// Unquoted text is returned verbatim.
fn unquote(value: &str, quotes: &[char]) -> String {
    for &q in quotes {
        if let Some(inner) = value.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return unescape(inner, q);
        }
    }
    value.to_string()
}

/// Resolves `\"` (or `\'`) and `\\`. Any other backslash is kept, so Windows paths survive.
fn unescape(inner: &str, quote: char) -> String {
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next) if next == quote || next == '\\' => {
                    result.push(next);
                    chars.next();
                }
                _ => result.push(c),
            }
        } else {
            result.push(c);
        }
    }
    result
}

// --- SCRIPT PARSER ---

/// Splits command-file text into numbered script lines.
///
/// Blank lines, `#` comments and `/* ... */` comment blocks are dropped. A block opens on a
/// line starting with `/*` and closes on the first line that starts or ends with `*/`.
pub fn parse_script(text: &str) -> Script {
    let mut lines = Vec::new();
    let mut in_block_comment = false;

    for (index, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();

        if in_block_comment {
            if trimmed.starts_with("*/") || trimmed.ends_with("*/") {
                in_block_comment = false;
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("/*") {
            in_block_comment = !rest.ends_with("*/");
            continue;
        }

        match parse_line(trimmed) {
            Ok(None) => {}
            Ok(Some(cmd)) => lines.push(ScriptLine {
                number: index + 1,
                text: trimmed.to_string(),
                parsed: Ok(cmd),
            }),
            Err(e) => {
                log::debug!("Syntax error on line {}: {}", index + 1, e);
                lines.push(ScriptLine {
                    number: index + 1,
                    text: trimmed.to_string(),
                    parsed: Err(e),
                });
            }
        }
    }

    if in_block_comment {
        log::warn!("Command file ends inside an unterminated /* comment block.");
    }
    Script { lines }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ParsedCommand {
        parse_line(line).unwrap().unwrap()
    }

    #[test]
    fn test_scalar_parameters() {
        let cmd = parse(r#"ReadLayer(Path="a.geojson", ID="x")"#);
        assert_eq!(cmd.name, "ReadLayer");
        assert_eq!(cmd.len(), 2);
        assert_eq!(cmd.scalar("Path"), Some("a.geojson"));
        assert_eq!(cmd.scalar("ID"), Some("x"));
    }

    #[test]
    fn test_list_parameter() {
        let cmd = parse(r#"MergeLayers(IDs=["x","y"], OutputID="z")"#);
        assert_eq!(
            cmd.list("IDs"),
            Some(&["x".to_string(), "y".to_string()][..])
        );
        assert_eq!(cmd.scalar("OutputID"), Some("z"));
    }

    #[test]
    fn test_comments_and_blank_lines_produce_nothing() {
        assert_eq!(parse_line("# ReadLayer(Path=\"a\")").unwrap(), None);
        assert_eq!(parse_line("   #indented comment").unwrap(), None);
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   \t ").unwrap(), None);
    }

    #[test]
    fn test_zero_parameters() {
        let cmd = parse("Exit()");
        assert_eq!(cmd.name, "Exit");
        assert!(cmd.is_empty());

        let cmd = parse("  Exit (   )  ");
        assert_eq!(cmd.name, "Exit");
        assert!(cmd.is_empty());
    }

    #[test]
    fn test_unquoted_values_and_whitespace_around_equals() {
        let cmd = parse("SetProperty(PropertyName = Count ,PropertyValue=  12 )");
        assert_eq!(cmd.scalar("PropertyName"), Some("Count"));
        assert_eq!(cmd.scalar("PropertyValue"), Some("12"));
    }

    #[test]
    fn test_escaped_quote_in_value() {
        let cmd = parse(r#"Message(Message="He said \"hi, there\"", CommandStatus=Warning)"#);
        assert_eq!(cmd.scalar("Message"), Some(r#"He said "hi, there""#));
        assert_eq!(cmd.scalar("CommandStatus"), Some("Warning"));
    }

    #[test]
    fn test_comma_before_closing_quote_stays_in_value() {
        let cmd = parse(r#"Message(Message="a,b,", CommandStatus="Success")"#);
        assert_eq!(cmd.scalar("Message"), Some("a,b,"));
        assert_eq!(cmd.len(), 2);
    }

    #[test]
    fn test_trailing_comma_before_closing_bracket() {
        let cmd = parse(r#"FreeLayer(IDs=["a", "b",])"#);
        assert_eq!(cmd.list("IDs").unwrap().len(), 2);
    }

    #[test]
    fn test_trailing_comma_before_closing_paren() {
        let cmd = parse(r#"ReadLayer(Path="a.geojson",)"#);
        assert_eq!(cmd.len(), 1);
    }

    #[test]
    fn test_empty_list() {
        let cmd = parse("FreeLayer(IDs=[])");
        assert_eq!(cmd.list("IDs"), Some(&[][..]));

        let cmd = parse("FreeLayer(IDs=[   ])");
        assert!(cmd.list("IDs").unwrap().is_empty());
    }

    #[test]
    fn test_single_quoted_list_elements_keep_commas() {
        let cmd = parse(r#"For(Name=loop, ListValues=['a,b', "c", d ])"#);
        assert_eq!(
            cmd.list("ListValues").unwrap(),
            &["a,b".to_string(), "c".to_string(), "d".to_string()]
        );
    }

    #[test]
    fn test_single_quote_in_scalar_is_literal() {
        let cmd = parse(r#"Message(Message=it's fine)"#);
        assert_eq!(cmd.scalar("Message"), Some("it's fine"));
    }

    #[test]
    fn test_brackets_inside_quotes_are_scalar() {
        let cmd = parse(r#"Message(Message="[not, a list]")"#);
        assert_eq!(cmd.scalar("Message"), Some("[not, a list]"));
    }

    #[test]
    fn test_parentheses_inside_values() {
        let cmd = parse(r#"If(Name=a, Condition="(${X}) == (1)")"#);
        assert_eq!(cmd.scalar("Condition"), Some("(${X}) == (1)"));
    }

    #[test]
    fn test_windows_paths_keep_backslashes() {
        let cmd = parse(r#"ReadLayer(Path="C:\data\in.geojson")"#);
        assert_eq!(cmd.scalar("Path"), Some(r"C:\data\in.geojson"));
    }

    #[test]
    fn test_property_placeholders_are_not_expanded() {
        let cmd = parse(r#"ReadLayer(Path="${WorkingDir}/a.geojson")"#);
        assert_eq!(cmd.scalar("Path"), Some("${WorkingDir}/a.geojson"));
    }

    // --- Syntax Errors ---

    #[test]
    fn test_missing_parentheses() {
        assert_eq!(parse_line("ReadLayer"), Err(ParseError::MissingOpenParen));
        assert_eq!(
            parse_line(r#"ReadLayer(Path="a""#).unwrap_err(),
            ParseError::MissingCloseParen
        );
    }

    #[test]
    fn test_trailing_text_after_close_paren() {
        assert!(matches!(
            parse_line("Exit() now"),
            Err(ParseError::TrailingText(t)) if t == "now"
        ));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = parse_line(r#"Message(Message="oops)"#).unwrap_err();
        assert_eq!(err, ParseError::UnterminatedQuote(16));
    }

    #[test]
    fn test_error_columns_count_characters() {
        let err = parse_line(r#"Message(Message="é", Other="oops)"#).unwrap_err();
        assert_eq!(err, ParseError::UnterminatedQuote(28));
    }

    #[test]
    fn test_unterminated_list() {
        let err = parse_line(r#"FreeLayer(IDs=["a", "b")"#).unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedList(_)));
    }

    #[test]
    fn test_malformed_list() {
        let err = parse_line(r#"FreeLayer(IDs=["a"] extra)"#).unwrap_err();
        assert_eq!(err, ParseError::MalformedList("IDs".to_string()));
    }

    #[test]
    fn test_missing_equals_and_bad_names() {
        assert_eq!(
            parse_line("ReadLayer(a.geojson)").unwrap_err(),
            ParseError::MissingEquals("a.geojson".to_string())
        );
        assert!(matches!(
            parse_line("Read Layer(Path=a)"),
            Err(ParseError::InvalidCommandName(_))
        ));
        assert_eq!(parse_line("(Path=a)"), Err(ParseError::EmptyCommandName));
        assert!(matches!(
            parse_line("ReadLayer(=a)"),
            Err(ParseError::InvalidParameterName(_))
        ));
    }

    #[test]
    fn test_duplicate_parameter() {
        assert_eq!(
            parse_line("ReadLayer(ID=a, ID=b)"),
            Err(ParseError::DuplicateParameter("ID".to_string()))
        );
    }

    // --- Round Trip ---

    #[test]
    fn test_display_then_parse_yields_equal_parameters() {
        let lines = [
            r#"ReadLayer(Path="a.geojson", ID="x")"#,
            r#"Message(Message="He said \"hi\", twice \\ ok", CommandStatus=Warning)"#,
            r#"MergeLayers(IDs=["x", 'y,z'], OutputID=out)"#,
            "Exit()",
        ];
        for line in lines {
            let first = parse(line);
            let second = parse(&first.to_string());
            assert_eq!(first, second, "round trip failed for {}", line);
        }
    }

    // --- Script Parsing ---

    #[test]
    fn test_parse_script_numbers_lines_and_skips_comments() {
        let text = "\
# header
ReadLayer(Path=\"a.geojson\")

/* block
Broken(
*/
/* one-liner */
Message(Message=\"hi\")
Nope
";
        let script = parse_script(text);
        assert_eq!(script.len(), 3);
        assert_eq!(script.lines[0].number, 2);
        assert_eq!(script.lines[1].number, 8);
        assert_eq!(script.lines[1].text, "Message(Message=\"hi\")");
        assert_eq!(script.lines[2].number, 9);
        assert_eq!(script.lines[2].parsed, Err(ParseError::MissingOpenParen));
    }
}
