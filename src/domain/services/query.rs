//! Path and filter queries
//!
//! A query is either a path selector (`participation[RecordTarget].player`)
//! or, when it contains a top-level `=`, a filter predicate:
//!
//! ```text
//! statusConcept=active&dateOfBirth=<2010-01-01
//! doseSequence=1|2|3
//! deceasedDate=null
//! name.given=~ann
//! ```
//!
//! Terms joined by `&` must all hold; alternatives separated by `|` within a
//! term are or-ed. Operators prefix the value: `!` (not equal), `<`, `<=`,
//! `>`, `>=` and `~` (contains). `null` / `!null` test for presence.

use std::cmp::Ordering;

use serde_json::Value;

use crate::domain::ports::PathAccessor;
use crate::domain::value_objects::{parse_temporal, ObjectPath};
use crate::error::CompileError;

static NULL: Value = Value::Null;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    IsNull,
    NotNull,
    Compare(Operator, String),
}

#[derive(Debug, Clone, PartialEq)]
struct FilterTerm {
    path: ObjectPath,
    alternatives: Vec<Predicate>,
}

/// A parsed filter predicate
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    terms: Vec<FilterTerm>,
}

/// A parsed query
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledQuery {
    Selector(ObjectPath),
    Filter(QueryFilter),
}

impl CompiledQuery {
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        if is_filter(text) {
            QueryFilter::parse(text).map(CompiledQuery::Filter)
        } else {
            ObjectPath::parse(text).map(CompiledQuery::Selector)
        }
    }

    /// Selectors yield the addressed value(s); filters yield a boolean
    pub fn evaluate(&self, accessor: &dyn PathAccessor, target: &Value) -> Value {
        match self {
            CompiledQuery::Selector(path) => collapse(accessor.select(target, path)),
            CompiledQuery::Filter(filter) => Value::Bool(filter.matches(accessor, target)),
        }
    }
}

/// Zero matches are null, one is itself, several become a collection
pub fn collapse(values: Vec<&Value>) -> Value {
    match values.len() {
        0 => Value::Null,
        1 => values[0].clone(),
        _ => Value::Array(values.into_iter().cloned().collect()),
    }
}

/// True when `text` holds a `=` outside any `[guard]`
pub fn is_filter(text: &str) -> bool {
    split_top_level(text, '=').len() > 1
}

/// Split on `separator` where it is not inside brackets or quotes
fn split_top_level(text: &str, separator: char) -> Vec<(usize, &str)> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 && !quoted => {
                parts.push((start, &text[start..i]));
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push((start, &text[start..]));
    parts
}

impl QueryFilter {
    pub fn parse(text: &str) -> Result<Self, CompileError> {
        let mut terms = Vec::new();
        for (offset, term) in split_top_level(text, '&') {
            if term.trim().is_empty() {
                return Err(CompileError::new(text, offset, "empty filter term"));
            }
            let mut halves = split_top_level(term, '=').into_iter();
            let (_, path_text) = halves.next().unwrap_or((0, ""));
            let rest: Vec<&str> = halves.map(|(_, s)| s).collect();
            if rest.is_empty() {
                return Err(CompileError::new(text, offset, "filter term needs '='"));
            }
            if path_text.trim().is_empty() {
                return Err(CompileError::new(text, offset, "filter term has no path"));
            }
            let path = ObjectPath::parse(path_text)
                .map_err(|e| CompileError::new(text, offset + e.position, e.message))?;
            let alternatives = rest
                .join("=")
                .split('|')
                .map(parse_predicate)
                .collect();
            terms.push(FilterTerm { path, alternatives });
        }
        Ok(Self { terms })
    }

    pub fn matches(&self, accessor: &dyn PathAccessor, target: &Value) -> bool {
        self.terms.iter().all(|term| {
            let mut values = accessor.select(target, &term.path);
            if values.is_empty() {
                values.push(&NULL);
            }
            term.alternatives
                .iter()
                .any(|predicate| values.iter().any(|v| predicate_holds(predicate, v)))
        })
    }
}

fn parse_predicate(raw: &str) -> Predicate {
    let raw = raw.trim();
    match raw {
        "null" => return Predicate::IsNull,
        "!null" => return Predicate::NotNull,
        _ => {}
    }
    let (op, rest) = if let Some(rest) = raw.strip_prefix("<=") {
        (Operator::LessOrEqual, rest)
    } else if let Some(rest) = raw.strip_prefix(">=") {
        (Operator::GreaterOrEqual, rest)
    } else if let Some(rest) = raw.strip_prefix('<') {
        (Operator::Less, rest)
    } else if let Some(rest) = raw.strip_prefix('>') {
        (Operator::Greater, rest)
    } else if let Some(rest) = raw.strip_prefix('!') {
        (Operator::NotEqual, rest)
    } else if let Some(rest) = raw.strip_prefix('~') {
        (Operator::Contains, rest)
    } else {
        (Operator::Equal, raw)
    };
    let literal = rest.trim();
    let literal = literal
        .strip_prefix('"')
        .and_then(|l| l.strip_suffix('"'))
        .unwrap_or(literal);
    Predicate::Compare(op, literal.to_string())
}

fn predicate_holds(predicate: &Predicate, value: &Value) -> bool {
    match predicate {
        Predicate::IsNull => value.is_null(),
        Predicate::NotNull => !value.is_null(),
        Predicate::Compare(Operator::Contains, literal) => match value {
            Value::String(s) => s.to_lowercase().contains(&literal.to_lowercase()),
            Value::Array(items) => items.iter().any(|i| literal_ordering(i, literal) == Some(Ordering::Equal)),
            _ => false,
        },
        Predicate::Compare(op, literal) => {
            let ordering = literal_ordering(value, literal);
            match op {
                Operator::Equal => ordering == Some(Ordering::Equal),
                Operator::NotEqual => ordering != Some(Ordering::Equal),
                Operator::Less => ordering == Some(Ordering::Less),
                Operator::LessOrEqual => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                Operator::Greater => ordering == Some(Ordering::Greater),
                Operator::GreaterOrEqual => {
                    matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                }
                Operator::Contains => false,
            }
        }
    }
}

/// Compare a model value with query literal text
fn literal_ordering(value: &Value, literal: &str) -> Option<Ordering> {
    match value {
        Value::Number(n) => n.as_f64()?.partial_cmp(&literal.parse::<f64>().ok()?),
        Value::Bool(b) => Some(b.cmp(&literal.parse::<bool>().ok()?)),
        Value::String(s) => {
            let literal_value = Value::String(literal.to_string());
            match (parse_temporal(value), parse_temporal(&literal_value)) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => Some(s.as_str().cmp(literal)),
            }
        }
        _ => None,
    }
}
