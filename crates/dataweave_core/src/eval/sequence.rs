//! Sequence operators.
//!
//! Nested expressions (predicates, projections, keys) are evaluated per
//! element with a fresh evaluator, with the element pushed onto the scope
//! the operator was created in.

use std::cmp::Ordering;
use std::collections::HashSet;

use dataweave_error::{DbError, ErrorKind, Result};
use indexmap::IndexMap;

use super::scope::Scope;
use super::{NaiveEvaluator, ValueStream};
use crate::expr::Expression;
use crate::expr::group_expr::{GROUP_KEY_FIELD, GROUP_VALUE_FIELD};
use crate::expr::sort_expr::SortKey;
use crate::values::{HashKey, Record, Value};

/// Create a stream that calls `f` on first pull to produce the actual
/// stream.
pub fn deferred<F>(f: F) -> ValueStream
where
    F: FnOnce() -> Result<ValueStream> + Send + 'static,
{
    let mut init = Some(f);
    let mut stream: Option<ValueStream> = None;
    Box::new(std::iter::from_fn(move || {
        if let Some(f) = init.take() {
            match f() {
                Ok(s) => stream = Some(s),
                Err(e) => return Some(Err(e)),
            }
        }
        stream.as_mut()?.next()
    }))
}

pub fn filter(source: ValueStream, predicate: Expression, scope: Scope) -> ValueStream {
    Box::new(source.filter_map(move |value| {
        let value = match value {
            Ok(value) => value,
            Err(e) => return Some(Err(e)),
        };
        let keep = NaiveEvaluator::new()
            .eval_value(&predicate, &scope.push(value.clone()))
            .and_then(|v| v.try_as_predicate());
        match keep {
            Ok(true) => Some(Ok(value)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }))
}

pub fn map(source: ValueStream, projection: Expression, scope: Scope) -> ValueStream {
    Box::new(source.map(move |value| {
        NaiveEvaluator::new().eval_value(&projection, &scope.push(value?))
    }))
}

pub fn distinct(source: ValueStream) -> ValueStream {
    let mut seen = HashSet::new();
    Box::new(source.filter_map(move |value| {
        let value = match value {
            Ok(value) => value,
            Err(e) => return Some(Err(e)),
        };
        match HashKey::try_new(value.clone()) {
            Ok(key) => seen.insert(key).then_some(Ok(value)),
            Err(e) => Some(Err(e)),
        }
    }))
}

pub fn slice(source: ValueStream, start: usize, stop: Option<usize>) -> ValueStream {
    let iter = source
        .enumerate()
        .filter_map(move |(idx, value)| match value {
            Err(e) => Some(Err(e)),
            Ok(value) if idx >= start => Some(Ok(value)),
            Ok(_) => None,
        });
    match stop {
        // Stop pulling from the source once we have everything.
        Some(stop) => Box::new(iter.take(stop.saturating_sub(start))),
        None => Box::new(iter),
    }
}

/// Stable sort on multiple keys.
pub fn sort(source: ValueStream, keys: Vec<SortKey>, scope: Scope) -> ValueStream {
    deferred(move || {
        let evaluator = NaiveEvaluator::new();
        let mut rows = source
            .map(|value| {
                let value = value?;
                let scope = scope.push(value.clone());
                let key_values = keys
                    .iter()
                    .map(|key| evaluator.eval_value(&key.expr, &scope))
                    .collect::<Result<Vec<_>>>()?;
                Ok((key_values, value))
            })
            .collect::<Result<Vec<_>>>()?;

        rows.sort_by(|(a, _), (b, _)| {
            compare_rows(&keys, a, b, |a, b| Ok(total_cmp(a, b))).unwrap_or(Ordering::Equal)
        });

        // Values of incompatible types end up next to each other.
        for pair in rows.windows(2) {
            compare_rows(&keys, &pair[0].0, &pair[1].0, Value::try_cmp)?;
        }

        Ok(Box::new(rows.into_iter().map(|(_, value)| Ok(value))))
    })
}

fn compare_rows<F>(keys: &[SortKey], a: &[Value], b: &[Value], cmp: F) -> Result<Ordering>
where
    F: Fn(&Value, &Value) -> Result<Ordering>,
{
    for (idx, key) in keys.iter().enumerate() {
        match cmp(&a[idx], &b[idx])? {
            Ordering::Equal => continue,
            ord if key.ascending => return Ok(ord),
            ord => return Ok(ord.reverse()),
        }
    }
    Ok(Ordering::Equal)
}

/// Total order over all values, agreeing with `Value::try_cmp` wherever that
/// succeeds. Values that can't be ordered against each other are ordered by
/// type.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::List(a), Value::List(b)) => {
            for (a, b) in a.iter().zip(b.iter()) {
                match total_cmp(a, b) {
                    Ordering::Equal => continue,
                    ord => return ord,
                }
            }
            a.len().cmp(&b.len())
        }
        _ => match a.try_cmp(b) {
            Ok(ord) => ord,
            Err(_) => type_rank(a).cmp(&type_rank(b)),
        },
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Boolean(_) => 1,
        Value::Int(_) | Value::Float(_) => 2,
        Value::Text(_) => 3,
        Value::Bytes(_) => 4,
        Value::Timestamp(_) => 5,
        Value::List(_) => 6,
        Value::Record(_) | Value::Item(_) => 7,
    }
}

/// Group elements by key, emitting one `{key, value}` record per group in
/// order of first occurrence.
pub fn group_by(
    source: ValueStream,
    key: Expression,
    aggregate: Expression,
    scope: Scope,
) -> ValueStream {
    deferred(move || {
        let evaluator = NaiveEvaluator::new();
        let mut groups: IndexMap<HashKey, Vec<Value>> = IndexMap::new();
        for value in source {
            let value = value?;
            let key = evaluator.eval_value(&key, &scope.push(value.clone()))?;
            groups.entry(HashKey::try_new(key)?).or_default().push(value);
        }

        let records = groups
            .into_iter()
            .map(|(key, members)| {
                let value = evaluator.eval_value(&aggregate, &scope.push(Value::List(members)))?;
                Ok(Value::Record(Record::from_iter([
                    (GROUP_KEY_FIELD, key.into_value()),
                    (GROUP_VALUE_FIELD, value),
                ])))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Box::new(records.into_iter().map(Ok)))
    })
}

/// Error for a sequence operator applied to something that isn't a sequence.
pub fn not_a_sequence(value: &Value) -> DbError {
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!("Expected a sequence, got a {} value", value.type_name()),
    )
}
