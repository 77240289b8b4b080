use std::cmp::Ordering;

use dataweave_error::{DbError, ErrorKind, Result};

use super::scope::Scope;
use super::{NaiveEvaluator, ValueStream};
use crate::expr::Expression;
use crate::expr::aggregate_expr::AggregateOperator;
use crate::values::{Value, compute};

/// Compute an aggregate over a sequence.
///
/// Nulls are skipped by every operator other than a plain `count`/`len`.
pub fn aggregate(
    op: AggregateOperator,
    source: ValueStream,
    projection: Option<&Expression>,
    scope: &Scope,
) -> Result<Value> {
    let evaluator = NaiveEvaluator::new();
    let mut values = source.map(|value| {
        let value = value?;
        match projection {
            Some(expr) => evaluator.eval_value(expr, &scope.push(value)),
            None => Ok(value),
        }
    });

    match op {
        AggregateOperator::Len => count(values, false),
        AggregateOperator::Count => count(values, projection.is_some()),
        AggregateOperator::Sum => {
            let mut sum = Value::Int(0);
            for value in values {
                let value = value?;
                match value {
                    Value::Null => continue,
                    Value::Int(_) | Value::Float(_) => sum = compute::add(&sum, &value)?,
                    other => return Err(non_numeric(op, &other)),
                }
            }
            Ok(sum)
        }
        AggregateOperator::Avg => {
            let mut sum = 0.0;
            let mut count = 0;
            for value in values {
                match value? {
                    Value::Null => continue,
                    Value::Int(i) => sum += i as f64,
                    Value::Float(f) => sum += f,
                    other => return Err(non_numeric(op, &other)),
                }
                count += 1;
            }
            if count == 0 {
                return Err(empty(op));
            }
            Ok(Value::Float(sum / count as f64))
        }
        AggregateOperator::Min | AggregateOperator::Max => {
            let want = if op == AggregateOperator::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best: Option<Value> = None;
            while let Some(value) = values.next().transpose()? {
                if value.is_null() {
                    continue;
                }
                best = match best {
                    Some(current) if value.try_cmp(&current)? != want => Some(current),
                    _ => Some(value),
                };
            }
            best.ok_or_else(|| empty(op))
        }
    }
}

fn count(values: impl Iterator<Item = Result<Value>>, skip_nulls: bool) -> Result<Value> {
    let mut count = 0;
    for value in values {
        if value?.is_null() && skip_nulls {
            continue;
        }
        count += 1;
    }
    Ok(Value::Int(count))
}

fn empty(op: AggregateOperator) -> DbError {
    DbError::with_kind(
        ErrorKind::EmptyAggregation,
        format!("Cannot compute '{op}' of an empty sequence"),
    )
}

fn non_numeric(op: AggregateOperator, value: &Value) -> DbError {
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!("Cannot compute '{op}' of a {} value", value.type_name()),
    )
}
