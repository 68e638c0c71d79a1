//! Filename pattern parsing and composition.
//!
//! A pattern is a format string with named fields, e.g.
//! `{start_time:%Y%m%d_%H%M}_{area}_{product}.tif`. A field whose format
//! spec contains strftime directives parses into a timestamp; every other
//! field parses as text. The same pattern can be used in reverse to compose
//! a string from a field map, which is how layer names and property file
//! templates are rendered.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use thiserror::Error;

/// Result type alias for pattern operations.
pub type PatternResult<T> = Result<T, PatternError>;

/// Errors from compiling, matching, or composing a pattern.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("malformed pattern '{pattern}': {reason}")]
    Malformed { pattern: String, reason: String },

    #[error("unsupported time directive '%{0}'")]
    UnsupportedDirective(char),

    #[error("'{input}' does not match pattern '{pattern}'")]
    NoMatch { pattern: String, input: String },

    #[error("field '{field}': cannot parse '{value}' as a time")]
    TimeParse { field: String, value: String },

    #[error("no value for field '{0}'")]
    MissingField(String),
}

/// A parsed field value: a timestamp for strftime fields, text otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Time(NaiveDateTime),
    Text(String),
}

impl FieldValue {
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::Time(t) => Some(*t),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Time(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field { name: String, spec: Option<String> },
}

/// A compiled filename pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
    regex: Regex,
}

impl Pattern {
    /// Compile a pattern string.
    pub fn new(pattern: &str) -> PatternResult<Self> {
        let segments = tokenize(pattern)?;
        let regex = build_regex(pattern, &segments)?;
        Ok(Self {
            source: pattern.to_string(),
            segments,
            regex,
        })
    }

    /// The original pattern string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of the fields in the pattern, in order of appearance.
    pub fn field_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::Field { name, .. } => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Parse `input` into a field map.
    ///
    /// A repeated field must capture the same value everywhere it appears,
    /// otherwise the input does not match.
    pub fn parse(&self, input: &str) -> PatternResult<BTreeMap<String, FieldValue>> {
        let caps = self.regex.captures(input).ok_or_else(|| self.no_match(input))?;

        let mut fields = BTreeMap::new();
        let mut group = 0usize;
        for seg in &self.segments {
            let Segment::Field { name, spec } = seg else {
                continue;
            };
            let raw = caps
                .name(&group_name(group))
                .ok_or_else(|| self.no_match(input))?
                .as_str();
            group += 1;

            let value = match spec {
                Some(spec) if is_time_spec(spec) => {
                    FieldValue::Time(parse_time(name, raw, spec)?)
                }
                _ => FieldValue::Text(raw.to_string()),
            };

            if let Some(previous) = fields.get(name) {
                if previous != &value {
                    return Err(self.no_match(input));
                }
            }
            fields.insert(name.clone(), value);
        }

        Ok(fields)
    }

    /// Render the pattern from a field map; every field must be present.
    pub fn compose(&self, fields: &BTreeMap<String, FieldValue>) -> PatternResult<String> {
        self.render(fields, false)
    }

    /// Render the pattern, leaving unknown fields in place as `{name}`.
    pub fn compose_partial(&self, fields: &BTreeMap<String, FieldValue>) -> String {
        // With partial rendering enabled the only failure mode is gone.
        self.render(fields, true).unwrap_or_else(|_| self.source.clone())
    }

    fn render(
        &self,
        fields: &BTreeMap<String, FieldValue>,
        partial: bool,
    ) -> PatternResult<String> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, spec } => match fields.get(name) {
                    Some(FieldValue::Time(t)) => {
                        let fmt = spec.as_deref().unwrap_or("%Y%m%d%H%M%S");
                        out.push_str(&t.format(fmt).to_string());
                    }
                    Some(FieldValue::Text(s)) => out.push_str(s),
                    None if partial => match spec {
                        Some(spec) => out.push_str(&format!("{{{}:{}}}", name, spec)),
                        None => out.push_str(&format!("{{{}}}", name)),
                    },
                    None => return Err(PatternError::MissingField(name.clone())),
                },
            }
        }
        Ok(out)
    }

    fn no_match(&self, input: &str) -> PatternError {
        PatternError::NoMatch {
            pattern: self.source.clone(),
            input: input.to_string(),
        }
    }
}

/// Compose a bare template string against a text-only field map.
///
/// Convenience for one-shot composition of layer names and property file
/// lines, where the caller's metadata is plain strings.
pub fn compose_str(
    template: &str,
    fields: &BTreeMap<String, String>,
    partial: bool,
) -> PatternResult<String> {
    let pattern = Pattern::new(template)?;
    let values: BTreeMap<String, FieldValue> = fields
        .iter()
        .map(|(k, v)| (k.clone(), FieldValue::Text(v.clone())))
        .collect();
    if partial {
        Ok(pattern.compose_partial(&values))
    } else {
        pattern.compose(&values)
    }
}

fn group_name(index: usize) -> String {
    format!("f{}", index)
}

fn tokenize(pattern: &str) -> PatternResult<Vec<Segment>> {
    let malformed = |reason: &str| PatternError::Malformed {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let mut body = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    body.push(c);
                }
                if !closed {
                    return Err(malformed("unclosed field"));
                }
                let (name, spec) = match body.split_once(':') {
                    Some((name, spec)) => (name.to_string(), Some(spec.to_string())),
                    None => (body, None),
                };
                if name.is_empty() {
                    return Err(malformed("empty field name"));
                }
                segments.push(Segment::Field { name, spec });
            }
            '}' => return Err(malformed("unbalanced '}'")),
            _ => literal.push(ch),
        }
    }
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Ok(segments)
}

fn build_regex(pattern: &str, segments: &[Segment]) -> PatternResult<Regex> {
    let mut expr = String::from("^");
    let mut group = 0usize;
    for (idx, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Literal(text) => expr.push_str(&regex::escape(text)),
            Segment::Field { spec, .. } => {
                let body = match spec {
                    Some(spec) if is_time_spec(spec) => time_regex(spec)?,
                    // A text field stops at the next literal; a trailing
                    // field swallows the rest of the input.
                    _ if idx + 1 == segments.len() => ".+".to_string(),
                    _ => ".+?".to_string(),
                };
                expr.push_str(&format!("(?P<{}>{})", group_name(group), body));
                group += 1;
            }
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|err| PatternError::Malformed {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })
}

fn is_time_spec(spec: &str) -> bool {
    spec.contains('%')
}

fn time_regex(spec: &str) -> PatternResult<String> {
    let mut out = String::new();
    let mut chars = spec.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push_str(&regex::escape(&ch.to_string()));
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(r"\d{4}"),
            Some('y') | Some('m') | Some('d') | Some('H') | Some('M') | Some('S') => {
                out.push_str(r"\d{2}")
            }
            Some('j') => out.push_str(r"\d{3}"),
            Some('f') => out.push_str(r"\d{1,9}"),
            Some('z') => out.push_str(r"[+-]\d{2}:?\d{2}"),
            Some('%') => out.push('%'),
            Some(other) => return Err(PatternError::UnsupportedDirective(other)),
            None => return Err(PatternError::UnsupportedDirective('%')),
        }
    }
    Ok(out)
}

fn parse_time(field: &str, value: &str, spec: &str) -> PatternResult<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, spec) {
        return Ok(dt);
    }
    // Date-only and time-only specs still need to yield a full timestamp.
    if let Ok(date) = NaiveDate::parse_from_str(value, spec) {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    if let Ok(time) = NaiveTime::parse_from_str(value, spec) {
        if let Some(date) = NaiveDate::from_ymd_opt(1900, 1, 1) {
            return Ok(date.and_time(time));
        }
    }
    Err(PatternError::TimeParse {
        field: field.to_string(),
        value: value.to_string(),
    })
}
