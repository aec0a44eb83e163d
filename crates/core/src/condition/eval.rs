//! Interpreter for parsed condition expressions.

use std::cmp::Ordering;

use serde_json::Value;

use super::parser::{CompareOp, Expr};
use super::ConditionError;
use crate::document::Document;

/// Evaluate `expr` against `doc`, producing a JSON value.
pub fn eval(expr: &Expr, doc: &Document) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(path) => Ok(doc.lookup(path).cloned().unwrap_or(Value::Null)),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, doc))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, doc)?))),
        Expr::And(left, right) => {
            if !truthy(&eval(left, doc)?) {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval(right, doc)?)))
        }
        Expr::Or(left, right) => {
            if truthy(&eval(left, doc)?) {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval(right, doc)?)))
        }
        Expr::Compare { op, left, right } => {
            let left = eval(left, doc)?;
            let right = eval(right, doc)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
    }
}

/// Truthiness: null, false, zero, and empty strings/collections are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ConditionError> {
    match op {
        CompareOp::Eq => Ok(values_equal(left, right)),
        CompareOp::NotEq => Ok(!values_equal(left, right)),
        CompareOp::Lt => order(op, left, right).map(Ordering::is_lt),
        CompareOp::Le => order(op, left, right).map(Ordering::is_le),
        CompareOp::Gt => order(op, left, right).map(Ordering::is_gt),
        CompareOp::Ge => order(op, left, right).map(Ordering::is_ge),
        CompareOp::In => contains(op, right, left),
        CompareOp::NotIn => contains(op, right, left).map(|found| !found),
    }
}

/// Equality that treats `1` and `1.0` as the same number.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        _ => left == right,
    }
}

fn order(op: CompareOp, left: &Value, right: &Value) -> Result<Ordering, ConditionError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            a.zip(b)
                .and_then(|(a, b)| a.partial_cmp(&b))
                .ok_or_else(|| mismatch(op, left, right))
        }
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(op, left, right)),
    }
}

fn contains(op: CompareOp, haystack: &Value, needle: &Value) -> Result<bool, ConditionError> {
    match (haystack, needle) {
        (Value::Array(items), _) => Ok(items.iter().any(|item| values_equal(item, needle))),
        (Value::String(s), Value::String(sub)) => Ok(s.contains(sub.as_str())),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        _ => Err(mismatch(op, needle, haystack)),
    }
}

fn mismatch(op: CompareOp, left: &Value, right: &Value) -> ConditionError {
    ConditionError::TypeMismatch {
        op: op.as_str(),
        left: type_name(left),
        right: type_name(right),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
