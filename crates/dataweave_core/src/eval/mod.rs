//! Reference interpreter for expression trees.
//!
//! Filter, map, distinct and slice are lazy and can be used over unbounded
//! input. Sort and group-by need their whole input; they read it on the
//! first pull of their output. Aggregates and `one` are scalars and read
//! their input when evaluated.
pub mod aggregate;
pub mod scope;
pub mod sequence;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dataweave_error::{DbError, ErrorKind, Result};
use parking_lot::Mutex;
use scope::{Binding, RootInput, RootSource, Scope};
use tracing::trace;

use crate::expr::Expression;
use crate::expr::boolean_expr::BooleanOperator;
use crate::expr::comparison_expr::ComparisonOperator;
use crate::expr::negate_expr::NegateOperator;
use crate::expr::references::RootReferences;
use crate::values::{Record, Value, compute};

pub type ValueStream = Box<dyn Iterator<Item = Result<Value>> + Send>;

/// Result of evaluating an expression.
pub enum Output {
    Sequence(ValueStream),
    Value(Value),
}

impl Output {
    /// Get the output as a single value, collecting sequences into a list.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Sequence(stream) => Ok(Value::List(stream.collect::<Result<Vec<_>>>()?)),
        }
    }

    /// Get the output as a stream of values.
    ///
    /// Errors if the output is a value that isn't a list.
    pub fn into_stream(self) -> Result<ValueStream> {
        match self {
            Self::Sequence(stream) => Ok(stream),
            Self::Value(Value::List(values)) => Ok(Box::new(values.into_iter().map(Ok))),
            Self::Value(other) => Err(sequence::not_a_sequence(&other)),
        }
    }

    /// Collect a sequence output into a vec.
    pub fn try_collect(self) -> Result<Vec<Value>> {
        self.into_stream()?.collect()
    }
}

impl fmt::Debug for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequence(_) => write!(f, "Sequence"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Outputs to use in place of evaluating specific nodes of a tree.
///
/// Nodes are identified by address, so substitutions only apply to the exact
/// tree they were created for. Each is used at most once.
#[derive(Debug, Default)]
pub struct Substitutions {
    outputs: HashMap<usize, Output>,
}

impl Substitutions {
    pub fn insert(&mut self, expr: &Expression, output: Output) {
        self.outputs.insert(node_id(expr), output);
    }

    pub fn contains(&self, expr: &Expression) -> bool {
        self.outputs.contains_key(&node_id(expr))
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

fn node_id(expr: &Expression) -> usize {
    expr as *const Expression as usize
}

#[derive(Debug, Default)]
pub struct NaiveEvaluator {
    substitutions: Mutex<Substitutions>,
}

impl NaiveEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_substitutions(substitutions: Substitutions) -> Self {
        NaiveEvaluator {
            substitutions: Mutex::new(substitutions),
        }
    }

    /// Evaluate `expr` with `input` as the input sequence.
    pub fn run(&self, expr: &Expression, input: ValueStream) -> Result<Output> {
        self.run_with_root(expr, RootSource::Stream(input))
    }

    /// Evaluate `expr`, opening the input sequence only if it's needed.
    pub fn run_lazy<F>(&self, expr: &Expression, open: F) -> Result<Output>
    where
        F: FnOnce() -> Result<ValueStream> + Send + 'static,
    {
        self.run_with_root(expr, RootSource::Lazy(Box::new(open)))
    }

    /// Evaluate `expr` with a single value as its input.
    pub fn run_with_value(&self, expr: &Expression, input: Value) -> Result<Output> {
        self.eval(expr, &Scope::new(Binding::Value(input)))
    }

    fn run_with_root(&self, expr: &Expression, source: RootSource) -> Result<Output> {
        let refs = {
            let substitutions = self.substitutions.lock();
            RootReferences::count(expr, |e| substitutions.contains(e))
        };
        let materialize = refs.total() > 1 || refs.nested > 0;
        trace!(%expr, direct = refs.direct, nested = refs.nested, materialize, "naive evaluation");

        let root = RootInput::new(source, materialize);
        self.eval(expr, &Scope::new(Binding::Root(Arc::new(root))))
    }

    fn take_substitution(&self, expr: &Expression) -> Option<Output> {
        let mut substitutions = self.substitutions.lock();
        if substitutions.is_empty() {
            return None;
        }
        substitutions.outputs.remove(&node_id(expr))
    }

    pub fn eval(&self, expr: &Expression, scope: &Scope) -> Result<Output> {
        if let Some(output) = self.take_substitution(expr) {
            return Ok(output);
        }

        Ok(match expr {
            Expression::Context(context) => match scope.lookup(context.scope)? {
                Binding::Value(value) => Output::Value(value.clone()),
                Binding::Root(root) => Output::Sequence(root.stream()?),
            },
            Expression::Literal(literal) => Output::Value(literal.literal.clone()),
            Expression::Field(field) => {
                let base = self.eval_value(&field.base, scope)?;
                Output::Value(base.try_get_field(&field.name)?)
            }
            Expression::Comparison(cmp) => {
                let left = self.eval_value(&cmp.left, scope)?;
                let right = self.eval_value(&cmp.right, scope)?;
                Output::Value(compare(cmp.op, &left, &right)?)
            }
            Expression::Boolean(boolean) => {
                // Three-valued: a null operand makes the result null unless
                // another operand decides it.
                let mut saw_null = false;
                for operand in &boolean.operands {
                    match self.eval_value(operand, scope)? {
                        Value::Boolean(b) => match boolean.op {
                            BooleanOperator::And if !b => return Ok(Output::Value(false.into())),
                            BooleanOperator::Or if b => return Ok(Output::Value(true.into())),
                            _ => (),
                        },
                        Value::Null => saw_null = true,
                        other => {
                            return Err(DbError::with_kind(
                                ErrorKind::TypeMismatch,
                                format!(
                                    "Operand of '{}' must be boolean, got {}",
                                    boolean.op,
                                    other.type_name()
                                ),
                            ));
                        }
                    }
                }
                if saw_null {
                    Output::Value(Value::Null)
                } else {
                    Output::Value(Value::Boolean(boolean.op == BooleanOperator::And))
                }
            }
            Expression::Negate(negate) => {
                let value = self.eval_value(&negate.expr, scope)?;
                Output::Value(match negate.op {
                    NegateOperator::Not => match value {
                        Value::Null => Value::Null,
                        other => Value::Boolean(!other.try_as_bool()?),
                    },
                    NegateOperator::Negate => compute::neg(&value)?,
                })
            }
            Expression::Arith(arith) => {
                let left = self.eval_value(&arith.left, scope)?;
                let right = self.eval_value(&arith.right, scope)?;
                Output::Value(arith.op.apply(&left, &right)?)
            }
            Expression::Merge(merge) => {
                let left = self.eval_value(&merge.left, scope)?;
                let right = self.eval_value(&merge.right, scope)?;
                let mut record: Record = left.try_mapping_entries()?.into_iter().collect();
                for (name, value) in right.try_mapping_entries()? {
                    record.insert(name, value);
                }
                Output::Value(Value::Record(record))
            }
            Expression::Record(rec) => {
                let mut record = Record::new();
                for (name, field) in &rec.fields {
                    record.insert(name.clone(), self.eval_value(field, scope)?);
                }
                Output::Value(Value::Record(record))
            }
            Expression::Function(func) => {
                let input = self.eval_value(&func.input, scope)?;
                Output::Value(func.function.apply(&input)?)
            }
            Expression::Filter(filter) => {
                let source = self.eval_stream(&filter.source, scope)?;
                Output::Sequence(sequence::filter(
                    source,
                    filter.predicate.as_ref().clone(),
                    scope.clone(),
                ))
            }
            Expression::Map(map) => {
                let source = self.eval_stream(&map.source, scope)?;
                Output::Sequence(sequence::map(
                    source,
                    map.projection.as_ref().clone(),
                    scope.clone(),
                ))
            }
            Expression::Sort(sort) => {
                let source = self.eval_stream(&sort.source, scope)?;
                Output::Sequence(sequence::sort(source, sort.keys.clone(), scope.clone()))
            }
            Expression::GroupBy(group) => {
                let source = self.eval_stream(&group.source, scope)?;
                Output::Sequence(sequence::group_by(
                    source,
                    group.key.as_ref().clone(),
                    group.aggregate.as_ref().clone(),
                    scope.clone(),
                ))
            }
            Expression::Aggregate(agg) => {
                let source = self.eval_stream(&agg.source, scope)?;
                Output::Value(aggregate::aggregate(
                    agg.op,
                    source,
                    agg.expr.as_deref(),
                    scope,
                )?)
            }
            Expression::Distinct(distinct) => {
                let source = self.eval_stream(&distinct.source, scope)?;
                Output::Sequence(sequence::distinct(source))
            }
            Expression::Slice(slice) => {
                let source = self.eval_stream(&slice.source, scope)?;
                Output::Sequence(sequence::slice(source, slice.start, slice.stop))
            }
            Expression::One(one) => {
                let mut source = self.eval_stream(&one.source, scope)?;
                match source.next().transpose()? {
                    Some(value) => {
                        if source.next().transpose()?.is_some() {
                            return Err(DbError::with_kind(
                                ErrorKind::Cardinality,
                                "Expected exactly one element, got more",
                            ));
                        }
                        Output::Value(value)
                    }
                    None => match &one.default {
                        Some(default) => Output::Value(self.eval_value(default, scope)?),
                        None => {
                            return Err(DbError::with_kind(
                                ErrorKind::Cardinality,
                                "Expected exactly one element, got none",
                            ));
                        }
                    },
                }
            }
        })
    }

    /// Evaluate to a single value, collecting sequences into a list.
    pub fn eval_value(&self, expr: &Expression, scope: &Scope) -> Result<Value> {
        self.eval(expr, scope)?.into_value()
    }

    pub fn eval_stream(&self, expr: &Expression, scope: &Scope) -> Result<ValueStream> {
        self.eval(expr, scope)?.into_stream()
    }
}

/// Compare two values.
///
/// Ordering comparisons involving null produce null.
pub fn compare(op: ComparisonOperator, left: &Value, right: &Value) -> Result<Value> {
    Ok(match op {
        ComparisonOperator::Eq => Value::Boolean(left == right),
        ComparisonOperator::NotEq => Value::Boolean(left != right),
        _ if left.is_null() || right.is_null() => Value::Null,
        op => Value::Boolean(op.matches_ordering(left.try_cmp(right)?)),
    })
}
