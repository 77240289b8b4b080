//! Arithmetic on values.
//!
//! Int op Int stays Int (overflow checked) except for division which always
//! produces a Float. A null operand produces null.

use dataweave_error::{DbError, ErrorKind, Result};

use super::value::Value;

fn overflow(op: &str, left: &Value, right: &Value) -> DbError {
    DbError::with_kind(ErrorKind::Arithmetic, format!("Integer overflow in {op}"))
        .with_field("left", left)
        .with_field("right", right)
}

fn unsupported(op: &str, left: &Value, right: &Value) -> DbError {
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!(
            "Cannot {op} {} and {} values",
            left.type_name(),
            right.type_name()
        ),
    )
}

/// Apply a numeric operator with separate int and float implementations.
fn numeric<I, F>(op: &str, left: &Value, right: &Value, int_op: I, float_op: F) -> Result<Value>
where
    I: Fn(i64, i64) -> Option<i64>,
    F: Fn(f64, f64) -> f64,
{
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => int_op(*a, *b)
            .map(Value::Int)
            .ok_or_else(|| overflow(op, left, right)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => Ok(Value::Float(
            float_op(left.try_as_f64()?, right.try_as_f64()?),
        )),
        _ => Err(unsupported(op, left, right)),
    }
}

pub fn add(left: &Value, right: &Value) -> Result<Value> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => numeric("add", left, right, i64::checked_add, |a, b| a + b),
    }
}

pub fn sub(left: &Value, right: &Value) -> Result<Value> {
    numeric("subtract", left, right, i64::checked_sub, |a, b| a - b)
}

pub fn mul(left: &Value, right: &Value) -> Result<Value> {
    numeric("multiply", left, right, i64::checked_mul, |a, b| a * b)
}

pub fn div(left: &Value, right: &Value) -> Result<Value> {
    let (a, b) = match (left, right) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            (left.try_as_f64()?, right.try_as_f64()?)
        }
        _ => return Err(unsupported("divide", left, right)),
    };
    if b == 0.0 {
        return Err(DbError::with_kind(ErrorKind::Arithmetic, "Division by zero")
            .with_field("left", left));
    }
    Ok(Value::Float(a / b))
}

pub fn rem(left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if matches!(right, Value::Int(0)) || matches!(right, Value::Float(f) if *f == 0.0) {
        return Err(DbError::with_kind(ErrorKind::Arithmetic, "Division by zero")
            .with_field("left", left));
    }
    numeric("take the remainder of", left, right, i64::checked_rem, |a, b| a % b)
}

pub fn neg(value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| DbError::with_kind(ErrorKind::Arithmetic, "Integer overflow in negate")),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!("Cannot negate a {} value", other.type_name()),
        )),
    }
}
