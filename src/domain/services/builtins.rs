//! Builtin operators, members, methods and functions of the expression
//! language
//!
//! Everything here is pure: values in, value out. Anything that needs the
//! execution context (`fact(...)`, variables) lives in the compiler.

use std::cmp::Ordering;

use chrono::{Datelike, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use crate::domain::entities::BinaryOp;
use crate::domain::value_objects::{format_temporal, parse_temporal};
use crate::error::{EngineError, EngineResult};

/// Methods callable as `target.Method(args)`
pub const METHODS: &[&str] = &[
    "Any",
    "All",
    "Count",
    "Where",
    "Select",
    "First",
    "FirstOrDefault",
    "Last",
    "Sum",
    "Min",
    "Max",
    "Contains",
    "StartsWith",
    "EndsWith",
    "ToLower",
    "ToUpper",
];

/// Free functions callable as `name(args)`
pub const FUNCTIONS: &[&str] = &[
    "now",
    "today",
    "date",
    "fact",
    "coalesce",
    "daysBetween",
    "ageInYears",
    "abs",
    "round",
];

/// Canonical spelling of a method, matched case-insensitively
pub fn canonical_method(name: &str) -> Option<&'static str> {
    METHODS.iter().copied().find(|m| m.eq_ignore_ascii_case(name))
}

/// Canonical spelling of a function, matched case-insensitively
pub fn canonical_function(name: &str) -> Option<&'static str> {
    FUNCTIONS.iter().copied().find(|f| f.eq_ignore_ascii_case(name))
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "real",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "collection",
        Value::Object(_) => "object",
    }
}

/// Boolean view of a value: `null` is false, non-booleans are errors
pub fn as_bool(operation: &str, value: &Value) -> EngineResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(EngineError::type_mismatch(operation, "boolean", other)),
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Integral floats come back as integers
pub fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Elements of a collection; scalars are a one-element collection
pub fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Equality with numeric normalisation (`1 == 1.0`)
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        _ => left == right,
    }
}

/// Ordering of comparable values: numbers, timestamps, strings, booleans
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => {
            match (parse_temporal(left), parse_temporal(right)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(a.cmp(b)),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Total order for sorting: comparable values by `compare`, nulls last
pub fn sort_order(left: &Value, right: &Value) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare(left, right)
            .unwrap_or_else(|| type_name(left).cmp(type_name(right))),
    }
}

/// Apply a non-short-circuit binary operator
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> EngineResult<Value> {
    let symbol = op.symbol();
    match op {
        BinaryOp::Equal => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual => {
            // Comparisons against null are false, as with nullable operands
            if left.is_null() || right.is_null() {
                return Ok(Value::Bool(false));
            }
            let ordering = compare(left, right).ok_or_else(|| EngineError::TypeMismatch {
                operation: symbol.to_string(),
                expected: format!("comparable to {}", type_name(left)),
                found: type_name(right).to_string(),
            })?;
            let result = match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add if left.is_string() || right.is_string() => {
            Ok(Value::String(format!("{}{}", display(left), display(right))))
        }
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Remainder => arithmetic(op, left, right),
        BinaryOp::Coalesce => Ok(if left.is_null() {
            right.clone()
        } else {
            left.clone()
        }),
        BinaryOp::And | BinaryOp::Or => {
            let l = as_bool(symbol, left)?;
            let r = as_bool(symbol, right)?;
            Ok(Value::Bool(if op == BinaryOp::And { l && r } else { l || r }))
        }
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> EngineResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let symbol = op.symbol();
    let (Value::Number(a), Value::Number(b)) = (left, right) else {
        let culprit = if left.is_number() { right } else { left };
        return Err(EngineError::type_mismatch(symbol, "number", culprit));
    };
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        let result = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Subtract => x.checked_sub(y),
            BinaryOp::Multiply => x.checked_mul(y),
            BinaryOp::Divide => x.checked_div(y),
            _ => x.checked_rem(y),
        };
        return result
            .map(Value::from)
            .ok_or_else(|| integer_overflow(symbol, format!("{} {} {}", x, symbol, y)));
    }
    let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide => x / y,
        _ => x % y,
    };
    Ok(Number::from_f64(result).map(Value::Number).unwrap_or(Value::Null))
}

/// Text form used by string concatenation
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn integer_overflow(operation: &str, found: String) -> EngineError {
    EngineError::TypeMismatch {
        operation: operation.to_string(),
        expected: "a result within integer range".to_string(),
        found,
    }
}

pub fn negate(value: &Value) -> EngineResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i
                .checked_neg()
                .map(Value::from)
                .ok_or_else(|| integer_overflow("-", format!("-({})", i))),
            None => Ok(number(-n.as_f64().unwrap_or(f64::NAN))),
        },
        other => Err(EngineError::type_mismatch("-", "number", other)),
    }
}

/// Members that exist on every value when the key itself is absent
pub fn builtin_member(target: &Value, member: &str) -> Option<Value> {
    match member {
        "HasValue" => Some(Value::Bool(!target.is_null())),
        "Value" => Some(target.clone()),
        "Count" | "Length" => match target {
            Value::Array(items) => Some(Value::from(items.len())),
            Value::String(s) => Some(Value::from(s.chars().count())),
            Value::Null => Some(Value::Null),
            _ => None,
        },
        _ => None,
    }
}

/// Per-element callback for methods that take a lambda
pub type Selector<'s> = &'s dyn Fn(&Value) -> EngineResult<Value>;

/// Invoke a builtin method. `selector` is the compiled lambda argument.
pub fn call_method(
    method: &str,
    target: &Value,
    args: &[Value],
    selector: Option<Selector<'_>>,
) -> EngineResult<Value> {
    let Some(method) = canonical_method(method) else {
        return Err(EngineError::UnknownFunction(method.to_string()));
    };
    let test = |item: &Value| -> EngineResult<bool> {
        match selector {
            Some(select) => as_bool(method, &select(item)?),
            None => Ok(true),
        }
    };
    let project = |item: &Value| -> EngineResult<Value> {
        match selector {
            Some(select) => select(item),
            None => Ok(item.clone()),
        }
    };

    match method {
        "Any" => {
            for item in elements(target) {
                if test(item)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        "All" => {
            for item in elements(target) {
                if !test(item)? {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        "Count" => {
            if let Value::String(s) = target {
                return Ok(Value::from(s.chars().count()));
            }
            let mut count = 0usize;
            for item in elements(target) {
                if test(item)? {
                    count += 1;
                }
            }
            Ok(Value::from(count))
        }
        "Where" => {
            let mut out = Vec::new();
            for item in elements(target) {
                if test(item)? {
                    out.push(item.clone());
                }
            }
            Ok(Value::Array(out))
        }
        "Select" => elements(target)
            .into_iter()
            .map(project)
            .collect::<EngineResult<Vec<_>>>()
            .map(Value::Array),
        "First" | "FirstOrDefault" | "Last" => {
            let items = elements(target);
            let mut found = None;
            if method == "Last" {
                for item in items.into_iter().rev() {
                    if test(item)? {
                        found = Some(item.clone());
                        break;
                    }
                }
            } else {
                for item in items {
                    if test(item)? {
                        found = Some(item.clone());
                        break;
                    }
                }
            }
            match found {
                Some(value) => Ok(value),
                None if method == "FirstOrDefault" => Ok(Value::Null),
                None => Err(EngineError::Query {
                    query: method.to_string(),
                    message: "sequence contains no matching element".to_string(),
                }),
            }
        }
        "Sum" => {
            let mut total = 0.0;
            for item in elements(target) {
                let value = project(item)?;
                if value.is_null() {
                    continue;
                }
                total += as_f64(&value)
                    .ok_or_else(|| EngineError::type_mismatch("Sum", "number", &value))?;
            }
            Ok(number(total))
        }
        "Min" | "Max" => {
            let mut best: Option<Value> = None;
            for item in elements(target) {
                let value = project(item)?;
                if value.is_null() {
                    continue;
                }
                best = match best {
                    None => Some(value),
                    Some(current) => {
                        let ordering = compare(&value, &current).ok_or_else(|| {
                            EngineError::type_mismatch(method, type_name(&current), &value)
                        })?;
                        let better = if method == "Min" {
                            ordering == Ordering::Less
                        } else {
                            ordering == Ordering::Greater
                        };
                        Some(if better { value } else { current })
                    }
                };
            }
            Ok(best.unwrap_or(Value::Null))
        }
        "Contains" => {
            let needle = args.first().unwrap_or(&Value::Null);
            match target {
                Value::String(s) => Ok(Value::Bool(s.contains(display(needle).as_str()))),
                _ => Ok(Value::Bool(
                    elements(target).iter().any(|item| values_equal(item, needle)),
                )),
            }
        }
        "StartsWith" | "EndsWith" => {
            let Value::String(s) = target else {
                return if target.is_null() {
                    Ok(Value::Bool(false))
                } else {
                    Err(EngineError::type_mismatch(method, "string", target))
                };
            };
            let needle = display(args.first().unwrap_or(&Value::Null));
            Ok(Value::Bool(if method == "StartsWith" {
                s.starts_with(&needle)
            } else {
                s.ends_with(&needle)
            }))
        }
        "ToLower" | "ToUpper" => match target {
            Value::String(s) => Ok(Value::String(if method == "ToLower" {
                s.to_lowercase()
            } else {
                s.to_uppercase()
            })),
            Value::Null => Ok(Value::Null),
            other => Err(EngineError::type_mismatch(method, "string", other)),
        },
        other => Err(EngineError::UnknownFunction(other.to_string())),
    }
}

fn temporal_arg(function: &str, value: &Value) -> EngineResult<Option<NaiveDateTime>> {
    if value.is_null() {
        return Ok(None);
    }
    parse_temporal(value)
        .map(Some)
        .ok_or_else(|| EngineError::type_mismatch(function, "date", value))
}

/// Invoke a pure builtin function (everything except `fact`)
pub fn call_function(function: &str, args: &[Value]) -> EngineResult<Value> {
    let Some(function) = canonical_function(function) else {
        return Err(EngineError::UnknownFunction(function.to_string()));
    };
    let arg = |i: usize| args.get(i).unwrap_or(&Value::Null);
    match function {
        "now" => Ok(Value::String(Utc::now().to_rfc3339())),
        "today" => Ok(Value::String(
            Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        )),
        "date" => Ok(temporal_arg(function, arg(0))?
            .map(|moment| Value::String(format_temporal(&moment)))
            .unwrap_or(Value::Null)),
        "coalesce" => Ok(args
            .iter()
            .find(|v| !v.is_null())
            .cloned()
            .unwrap_or(Value::Null)),
        "daysBetween" => {
            let (Some(from), Some(to)) = (temporal_arg(function, arg(0))?, temporal_arg(function, arg(1))?)
            else {
                return Ok(Value::Null);
            };
            Ok(Value::from((to - from).num_days()))
        }
        "ageInYears" => {
            let Some(born) = temporal_arg(function, arg(0))? else {
                return Ok(Value::Null);
            };
            let as_of = match temporal_arg(function, arg(1))? {
                Some(moment) => moment.date(),
                None => Utc::now().date_naive(),
            };
            let born = born.date();
            let mut years = as_of.year() - born.year();
            if (as_of.month(), as_of.day()) < (born.month(), born.day()) {
                years -= 1;
            }
            Ok(Value::from(years))
        }
        "abs" => match arg(0) {
            Value::Null => Ok(Value::Null),
            Value::Number(n) => match n.as_i64() {
                Some(i) => i
                    .checked_abs()
                    .map(Value::from)
                    .ok_or_else(|| integer_overflow(function, format!("abs({})", i))),
                None => Ok(number(n.as_f64().unwrap_or(f64::NAN).abs())),
            },
            other => Err(EngineError::type_mismatch(function, "number", other)),
        },
        "round" => {
            let value = arg(0);
            if value.is_null() {
                return Ok(Value::Null);
            }
            let x = as_f64(value).ok_or_else(|| EngineError::type_mismatch(function, "number", value))?;
            let digits = arg(1).as_i64().unwrap_or(0).clamp(0, 12) as i32;
            let scale = 10f64.powi(digits);
            Ok(number((x * scale).round() / scale))
        }
        // `fact` is bound by the compiler
        other => Err(EngineError::UnknownFunction(other.to_string())),
    }
}
