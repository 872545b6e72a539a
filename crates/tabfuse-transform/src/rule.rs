//! Deterministic format rules.
//!
//! A rule is a template followed by zero or more operations:
//!
//! ```text
//! {first_name} {last_name} | squish | title
//! {email} | trim | lower
//! {phone} | digits | default("unknown")
//! {website} | regex_extract("https?://([^/]+)") | lower
//! {current} {notes} | squish
//! ```
//!
//! `{column}` interpolates the scalar text of a source column, `{current}`
//! the existing target value when merging, and `{{`/`}}` are literal braces.
//! Regexes are compiled when the rule is parsed.

use std::fmt;

use regex::Regex;
use tabfuse_common::normalize_text;
use tabfuse_model::{CellValue, Row};
use thiserror::Error;

/// Placeholder bound to the existing target value.
pub const CURRENT_PLACEHOLDER: &str = "current";

const KNOWN_OPS: &[(&str, &str)] = &[
    ("trim", "trim"),
    ("lower", "lower"),
    ("upper", "upper"),
    ("title", "title"),
    ("squish", "squish"),
    ("digits", "digits"),
    ("alnum", "alnum"),
    ("truncate", "truncate(n)"),
    ("default", "default(\"text\")"),
    ("regex_extract", "regex_extract(\"pattern\"[, group])"),
    ("regex_replace", "regex_replace(\"pattern\", \"replacement\")"),
];

/// Human-readable summary of the rule language, for prompts and help text.
pub fn rule_syntax() -> String {
    let ops: Vec<&str> = KNOWN_OPS.iter().map(|(_, signature)| *signature).collect();
    format!(
        "A rule is a template followed by `| op` steps. `{{column}}` inserts a source \
         column value, `{{{CURRENT_PLACEHOLDER}}}` the existing target value, `{{{{` and `}}}}` \
         are literal braces. A source column named `{CURRENT_PLACEHOLDER}` cannot be \
         referenced. Operations: {}.",
        ops.join(", ")
    )
}

/// Errors raised while parsing a format rule.
#[derive(Debug, Clone, Error)]
pub enum RuleError {
    #[error("rule is empty")]
    Empty,

    #[error("placeholder opened at position {position} is never closed")]
    UnclosedPlaceholder { position: usize },

    #[error("unmatched '}}' at position {position}")]
    UnmatchedBrace { position: usize },

    #[error("empty placeholder at position {position}")]
    EmptyPlaceholder { position: usize },

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("empty operation in pipeline")]
    EmptyOp,

    #[error("unknown operation '{0}'")]
    UnknownOp(String),

    #[error("invalid arguments for '{op}': {message}")]
    Arguments { op: String, message: String },

    #[error("invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule references unknown column '{0}'")]
    UnknownColumn(String),

    #[error("'{{current}}' is ambiguous because a source column is also named 'current'")]
    AmbiguousCurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone)]
enum Op {
    Trim,
    Lower,
    Upper,
    Title,
    Squish,
    Digits,
    Alnum,
    Truncate(usize),
    Default(String),
    RegexExtract { regex: Regex, group: usize },
    RegexReplace { regex: Regex, replacement: String },
}

impl Op {
    fn apply(&self, value: String) -> String {
        match self {
            Self::Trim => value.trim().to_string(),
            Self::Lower => value.to_lowercase(),
            Self::Upper => value.to_uppercase(),
            Self::Title => title_case(&value),
            Self::Squish => normalize_text(&value),
            Self::Digits => value.chars().filter(char::is_ascii_digit).collect(),
            Self::Alnum => value
                .chars()
                .filter_map(|c| {
                    if c.is_alphanumeric() {
                        Some(c)
                    } else if c.is_whitespace() {
                        Some(' ')
                    } else {
                        None
                    }
                })
                .collect(),
            Self::Truncate(n) => value.chars().take(*n).collect(),
            Self::Default(fallback) => {
                if value.trim().is_empty() {
                    fallback.clone()
                } else {
                    value
                }
            }
            Self::RegexExtract { regex, group } => regex
                .captures(&value)
                .and_then(|captures| captures.get(*group))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            Self::RegexReplace { regex, replacement } => {
                regex.replace_all(&value, replacement.as_str()).into_owned()
            }
        }
    }
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut word_start = true;
    for c in value.chars() {
        if c.is_alphanumeric() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// A parsed format rule.
#[derive(Debug, Clone)]
pub struct FormatRule {
    text: String,
    template: Vec<Segment>,
    ops: Vec<Op>,
}

impl FormatRule {
    /// Parses a rule without knowledge of the source columns.
    pub fn parse(text: &str) -> Result<Self, RuleError> {
        Self::parse_inner(text, None)
    }

    /// Parses a rule against the available source columns.
    ///
    /// A template that is exactly a column name is read as `{name}`, and every
    /// placeholder other than `{current}` must name one of `columns`. When one
    /// of `columns` is itself called `current`, the placeholder is rejected.
    pub fn parse_for_columns(text: &str, columns: &[String]) -> Result<Self, RuleError> {
        Self::parse_inner(text, Some(columns))
    }

    fn parse_inner(text: &str, columns: Option<&[String]>) -> Result<Self, RuleError> {
        if text.trim().is_empty() {
            return Err(RuleError::Empty);
        }
        let (template_text, op_texts) = split_pipeline(text)?;
        let template_text = template_text.trim();

        let bare_column = columns.and_then(|columns| {
            columns
                .iter()
                .find(|column| column.as_str() == template_text)
                .filter(|_| !template_text.contains(['{', '}']))
        });
        let template = match bare_column {
            Some(column) => vec![Segment::Placeholder(column.clone())],
            None => parse_template(template_text)?,
        };

        if let Some(columns) = columns {
            let current_is_column = columns.iter().any(|column| column == CURRENT_PLACEHOLDER);
            for segment in &template {
                if current_is_column
                    && matches!(segment, Segment::Placeholder(name) if name == CURRENT_PLACEHOLDER)
                {
                    return Err(RuleError::AmbiguousCurrent);
                }
                if let Segment::Placeholder(name) = segment
                    && name != CURRENT_PLACEHOLDER
                    && !columns.iter().any(|column| column == name)
                {
                    return Err(RuleError::UnknownColumn(name.clone()));
                }
            }
        }

        let ops = op_texts
            .into_iter()
            .map(parse_op)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            text: text.trim().to_string(),
            template,
            ops,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Source columns read by the template, excluding `{current}`.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.template.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) if name != CURRENT_PLACEHOLDER => Some(name.as_str()),
            _ => None,
        })
    }

    /// True when the rule combines the incoming value with the existing one.
    pub fn references_current(&self) -> bool {
        self.template
            .iter()
            .any(|segment| matches!(segment, Segment::Placeholder(name) if name == CURRENT_PLACEHOLDER))
    }

    /// Renders the template against `row` and runs the operations in order.
    pub fn evaluate(&self, row: &Row, current: Option<&CellValue>) -> String {
        let mut value = String::new();
        for segment in &self.template {
            match segment {
                Segment::Literal(text) => value.push_str(text),
                Segment::Placeholder(name) if name == CURRENT_PLACEHOLDER => {
                    if let Some(current) = current {
                        value.push_str(&current.to_text());
                    }
                }
                Segment::Placeholder(name) => value.push_str(&row.get(name).to_text()),
            }
        }
        self.ops.iter().fold(value, |value, op| op.apply(value))
    }
}

impl fmt::Display for FormatRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Splits off the template at the first `|` outside a placeholder, then splits
/// the operations at every `|` outside a string literal.
fn split_pipeline(text: &str) -> Result<(&str, Vec<&str>), RuleError> {
    let mut in_placeholder = false;
    let mut template_end = None;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        match c {
            '{' if !in_placeholder => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                } else {
                    in_placeholder = true;
                }
            }
            '}' if in_placeholder => in_placeholder = false,
            '|' if !in_placeholder => {
                template_end = Some(index);
                break;
            }
            _ => {}
        }
    }

    let Some(end) = template_end else {
        return Ok((text, Vec::new()));
    };
    let rest = &text[end + 1..];

    let mut ops = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (index, c) in rest.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if c == '|' {
            ops.push(&rest[start..index]);
            start = index + 1;
        }
    }
    if in_string {
        return Err(RuleError::UnterminatedString);
    }
    ops.push(&rest[start..]);
    Ok((&text[..end], ops))
}

fn parse_template(text: &str) -> Result<Vec<Segment>, RuleError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = text.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                literal.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(RuleError::UnclosedPlaceholder { position });
                }
                let name = name.trim();
                if name.is_empty() {
                    return Err(RuleError::EmptyPlaceholder { position });
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(name.to_string()));
            }
            '}' => return Err(RuleError::UnmatchedBrace { position }),
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Arg {
    Str(String),
    Int(usize),
}

fn parse_op(text: &str) -> Result<Op, RuleError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RuleError::EmptyOp);
    }
    let (name, args) = match text.find('(') {
        Some(open) => {
            let name = text[..open].trim();
            let inner = text[open + 1..]
                .strip_suffix(')')
                .ok_or_else(|| RuleError::Arguments {
                    op: name.to_string(),
                    message: "missing closing parenthesis".to_string(),
                })?;
            (name, parse_args(name, inner)?)
        }
        None => (text, Vec::new()),
    };
    let lowered = name.to_ascii_lowercase();

    let op = match (lowered.as_str(), args.as_slice()) {
        ("trim", []) => Op::Trim,
        ("lower", []) => Op::Lower,
        ("upper", []) => Op::Upper,
        ("title", []) => Op::Title,
        ("squish", []) => Op::Squish,
        ("digits", []) => Op::Digits,
        ("alnum", []) => Op::Alnum,
        ("truncate", [Arg::Int(n)]) => Op::Truncate(*n),
        ("default", [Arg::Str(fallback)]) => Op::Default(fallback.clone()),
        ("regex_extract", [Arg::Str(pattern)]) => {
            let regex = compile(pattern)?;
            let group = usize::from(regex.captures_len() > 1);
            Op::RegexExtract { regex, group }
        }
        ("regex_extract", [Arg::Str(pattern), Arg::Int(group)]) => {
            let regex = compile(pattern)?;
            if *group >= regex.captures_len() {
                return Err(RuleError::Arguments {
                    op: lowered.clone(),
                    message: format!(
                        "group {group} does not exist, pattern has {} group(s)",
                        regex.captures_len() - 1
                    ),
                });
            }
            Op::RegexExtract {
                regex,
                group: *group,
            }
        }
        ("regex_replace", [Arg::Str(pattern), Arg::Str(replacement)]) => Op::RegexReplace {
            regex: compile(pattern)?,
            replacement: replacement.clone(),
        },
        (known, _) => {
            return Err(match KNOWN_OPS.iter().find(|(op, _)| *op == known) {
                Some((_, signature)) => RuleError::Arguments {
                    op: lowered.clone(),
                    message: format!("expected {signature}"),
                },
                None => RuleError::UnknownOp(name.to_string()),
            });
        }
    };
    Ok(op)
}

fn compile(pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

fn parse_args(op: &str, inner: &str) -> Result<Vec<Arg>, RuleError> {
    let bad = |message: &str| RuleError::Arguments {
        op: op.to_string(),
        message: message.to_string(),
    };
    let mut args = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.peek() {
            None => break,
            Some('"') => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        // Only quotes and backslashes are escapes; regex escapes pass through.
                        '\\' => match chars.next_if(|next| matches!(next, '"' | '\\')) {
                            Some(escaped) => value.push(escaped),
                            None => value.push('\\'),
                        },
                        '"' => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(RuleError::UnterminatedString);
                }
                args.push(Arg::Str(value));
            }
            Some(_) => {
                let mut token = String::new();
                while let Some(c) = chars.next_if(|c| *c != ',') {
                    token.push(c);
                }
                let number = token
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| bad(&format!("'{}' is not a string or number", token.trim())))?;
                args.push(Arg::Int(number));
            }
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(other) => return Err(bad(&format!("unexpected '{other}'"))),
        }
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, CellValue)]) -> Row {
        Row::from_pairs(pairs.iter().cloned())
    }

    fn eval(rule: &str, row: &Row) -> String {
        FormatRule::parse(rule).unwrap().evaluate(row, None)
    }

    #[test]
    fn syntax_lists_every_operation() {
        let help = rule_syntax();
        assert!(help.contains("`{current}`"));
        assert!(help.contains("regex_extract(\"pattern\"[, group])"));
        assert!(help.contains("`{{` and `}}`"));
    }

    #[test]
    fn interpolates_and_pipes() {
        let r = row(&[
            ("first", CellValue::from("  jANE ")),
            ("last", CellValue::from("doe")),
        ]);
        assert_eq!(eval("{first} {last} | squish | title", &r), "Jane Doe");
        assert_eq!(eval("{last}, {first} | upper | trim", &r), "DOE,   JANE");
    }

    #[test]
    fn numbers_interpolate_as_plain_scalars() {
        let r = row(&[("salary", CellValue::Integer(50000))]);
        assert_eq!(eval("{salary}", &r), "50000");
        let r = row(&[("ratio", CellValue::Float(3.0))]);
        assert_eq!(eval("{ratio}", &r), "3");
    }

    #[test]
    fn escaped_braces_are_literal() {
        let r = row(&[("id", CellValue::Integer(7))]);
        assert_eq!(eval("{{{id}}}", &r), "{7}");
    }

    #[test]
    fn regex_ops() {
        let r = row(&[
            ("site", CellValue::from("https://Example.com/about")),
            ("phone", CellValue::from("+1 (555) 010-9999")),
        ]);
        assert_eq!(
            eval(r#"{site} | regex_extract("https?://([^/]+)") | lower"#, &r),
            "example.com"
        );
        assert_eq!(
            eval(r#"{site} | regex_extract("(https?)://([^/]+)", 2)"#, &r),
            "Example.com"
        );
        assert_eq!(eval("{phone} | digits", &r), "15550109999");
        assert_eq!(
            eval(r#"{phone} | regex_replace("[^0-9+]", "")"#, &r),
            "+15550109999"
        );
    }

    #[test]
    fn pipe_inside_string_argument_is_not_a_separator() {
        let r = row(&[("tags", CellValue::from("a|b"))]);
        assert_eq!(eval(r#"{tags} | regex_replace("\|", ", ")"#, &r), "a, b");
    }

    #[test]
    fn default_and_truncate() {
        let r = row(&[("name", CellValue::Missing)]);
        assert_eq!(eval(r#"{name} | default("n/a")"#, &r), "n/a");
        let r = row(&[("name", CellValue::from("Alexandria"))]);
        assert_eq!(eval("{name} | truncate(4)", &r), "Alex");
    }

    #[test]
    fn current_placeholder_reads_existing_value() {
        let rule = FormatRule::parse("{current} {notes} | squish").unwrap();
        assert!(rule.references_current());
        assert_eq!(rule.columns().collect::<Vec<_>>(), vec!["notes"]);
        let r = row(&[("notes", CellValue::from("met at conf"))]);
        assert_eq!(
            rule.evaluate(&r, Some(&CellValue::from("cold lead;"))),
            "cold lead; met at conf"
        );
        assert_eq!(rule.evaluate(&r, None), "met at conf");
    }

    #[test]
    fn bare_column_name_is_a_placeholder() {
        let columns = vec!["Email Address".to_string()];
        let rule = FormatRule::parse_for_columns("Email Address | lower", &columns).unwrap();
        let r = row(&[("Email Address", CellValue::from("J@X.COM"))]);
        assert_eq!(rule.evaluate(&r, None), "j@x.com");
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let columns = vec!["email".to_string()];
        let err = FormatRule::parse_for_columns("{mail} | lower", &columns).unwrap_err();
        assert!(matches!(err, RuleError::UnknownColumn(name) if name == "mail"));
        assert!(FormatRule::parse_for_columns("{current} {email}", &columns).is_ok());
    }

    #[test]
    fn source_column_named_current_is_ambiguous() {
        let columns = vec!["current".to_string(), "email".to_string()];
        for text in ["{current} | trim", "current", "{email}; {current}"] {
            let err = FormatRule::parse_for_columns(text, &columns).unwrap_err();
            assert!(matches!(err, RuleError::AmbiguousCurrent), "{text}");
        }
        assert!(FormatRule::parse_for_columns("{email}", &columns).is_ok());
        assert!(rule_syntax().contains("named `current` cannot be referenced"));
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(FormatRule::parse("  "), Err(RuleError::Empty)));
        assert!(matches!(
            FormatRule::parse("{name"),
            Err(RuleError::UnclosedPlaceholder { position: 0 })
        ));
        assert!(matches!(
            FormatRule::parse("a}"),
            Err(RuleError::UnmatchedBrace { position: 1 })
        ));
        assert!(matches!(FormatRule::parse("{ }"), Err(RuleError::EmptyPlaceholder { .. })));
        assert!(matches!(FormatRule::parse("{a} | shout"), Err(RuleError::UnknownOp(op)) if op == "shout"));
        assert!(matches!(FormatRule::parse("{a} | | lower"), Err(RuleError::EmptyOp)));
        assert!(matches!(
            FormatRule::parse("{a} | truncate(\"x\")"),
            Err(RuleError::Arguments { .. })
        ));
        assert!(matches!(
            FormatRule::parse(r#"{a} | default("x"#),
            Err(RuleError::UnterminatedString)
        ));
        assert!(matches!(
            FormatRule::parse(r#"{a} | regex_extract("(")"#),
            Err(RuleError::InvalidRegex { .. })
        ));
        assert!(matches!(
            FormatRule::parse(r#"{a} | regex_extract("(x)", 3)"#),
            Err(RuleError::Arguments { .. })
        ));
    }
}
