//! Query expression trees.
//!
//! Trees are built bottom up using the functions in this module and the
//! builder methods on [`Expression`]. Every builder type checks the node it
//! creates, so a tree that could be built is a valid tree.
//!
//! ```ignore
//! let by_name = source
//!     .all()
//!     .filter(expr::eq(expr::context().field("name")?, "foo")?)?
//!     .map(expr::context().field("id")?)?;
//! ```
pub mod aggregate_expr;
pub mod arith_expr;
pub mod boolean_expr;
pub mod comparison_expr;
pub mod context_expr;
pub mod field_expr;
pub mod filter_expr;
pub mod function_expr;
pub mod group_expr;
pub mod literal_expr;
pub mod map_expr;
pub mod merge_expr;
pub mod negate_expr;
pub mod record_expr;
pub mod references;
pub mod sequence_expr;
pub mod sort_expr;
pub mod typecheck;

use std::fmt;

use aggregate_expr::{AggregateExpr, AggregateOperator};
use arith_expr::{ArithExpr, ArithOperator};
use boolean_expr::{BooleanExpr, BooleanOperator};
use comparison_expr::{ComparisonExpr, ComparisonOperator};
use context_expr::ContextExpr;
use dataweave_error::{DbError, ErrorKind, Result};
use field_expr::FieldExpr;
use filter_expr::FilterExpr;
use function_expr::{FunctionExpr, Pattern, ScalarFunction};
use group_expr::GroupByExpr;
use literal_expr::LiteralExpr;
use map_expr::MapExpr;
use merge_expr::MergeExpr;
use negate_expr::{NegateExpr, NegateOperator};
use record_expr::RecordExpr;
use sequence_expr::{DistinctExpr, OneExpr, SliceExpr};
use sort_expr::{SortExpr, SortKey};

use crate::values::{DataType, TypeClass, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Context(ContextExpr),
    Literal(LiteralExpr),
    Field(FieldExpr),
    Comparison(ComparisonExpr),
    Boolean(BooleanExpr),
    Negate(NegateExpr),
    Arith(ArithExpr),
    Merge(MergeExpr),
    Record(RecordExpr),
    Function(FunctionExpr),
    Filter(FilterExpr),
    Map(MapExpr),
    Sort(SortExpr),
    GroupBy(GroupByExpr),
    Aggregate(AggregateExpr),
    Distinct(DistinctExpr),
    Slice(SliceExpr),
    One(OneExpr),
}

/// How a child expression is bound relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildScope {
    /// Evaluated with the same bindings as the parent.
    Same,
    /// Evaluated with a new innermost binding (per element, or per group).
    Nested,
}

impl Expression {
    /// Result type of this expression, with every unbound context taking
    /// its declared type.
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Context(expr) => expr.datatype.clone(),
            Self::Literal(expr) => expr.literal.datatype(),
            Self::Field(expr) => expr.datatype.clone(),
            Self::Comparison(_) | Self::Boolean(_) => DataType::Boolean,
            Self::Negate(expr) => match expr.op {
                NegateOperator::Not => DataType::Boolean,
                NegateOperator::Negate => expr.expr.datatype(),
            },
            Self::Arith(expr) => expr.datatype.clone(),
            Self::Merge(expr) => expr.datatype.clone(),
            Self::Record(expr) => expr.datatype.clone(),
            Self::Function(expr) => expr.function.return_type(),
            Self::Filter(FilterExpr { source, .. })
            | Self::Sort(SortExpr { source, .. })
            | Self::Distinct(DistinctExpr { source })
            | Self::Slice(SliceExpr { source, .. }) => match source.datatype() {
                DataType::Any => DataType::list(DataType::Any),
                other => other,
            },
            Self::Map(expr) => expr.datatype.clone(),
            Self::GroupBy(expr) => expr.datatype.clone(),
            Self::Aggregate(expr) => expr.datatype.clone(),
            Self::One(expr) => expr.datatype.clone(),
        }
    }

    pub fn type_class(&self) -> TypeClass {
        self.datatype().type_class()
    }

    fn set_datatype(&mut self, datatype: DataType) {
        match self {
            Self::Field(expr) => expr.datatype = datatype,
            Self::Arith(expr) => expr.datatype = datatype,
            Self::Merge(expr) => expr.datatype = datatype,
            Self::Record(expr) => expr.datatype = datatype,
            Self::Map(expr) => expr.datatype = datatype,
            Self::GroupBy(expr) => expr.datatype = datatype,
            Self::Aggregate(expr) => expr.datatype = datatype,
            Self::One(expr) => expr.datatype = datatype,
            _ => (),
        }
    }

    /// Type check a newly created node and record its result type.
    fn checked(mut self) -> Result<Self> {
        let datatype = typecheck::derive(&self, &[])?;
        self.set_datatype(datatype);
        Ok(self)
    }

    /// Call `func` on every direct child, in evaluation order.
    pub fn for_each_child<F>(&self, func: &mut F) -> Result<()>
    where
        F: FnMut(&Expression, ChildScope) -> Result<()>,
    {
        match self {
            Self::Context(_) | Self::Literal(_) => (),
            Self::Field(expr) => func(&expr.base, ChildScope::Same)?,
            Self::Comparison(expr) => {
                func(&expr.left, ChildScope::Same)?;
                func(&expr.right, ChildScope::Same)?;
            }
            Self::Boolean(expr) => {
                for operand in &expr.operands {
                    func(operand, ChildScope::Same)?;
                }
            }
            Self::Negate(expr) => func(&expr.expr, ChildScope::Same)?,
            Self::Arith(expr) => {
                func(&expr.left, ChildScope::Same)?;
                func(&expr.right, ChildScope::Same)?;
            }
            Self::Merge(expr) => {
                func(&expr.left, ChildScope::Same)?;
                func(&expr.right, ChildScope::Same)?;
            }
            Self::Record(expr) => {
                for (_, field) in &expr.fields {
                    func(field, ChildScope::Same)?;
                }
            }
            Self::Function(expr) => func(&expr.input, ChildScope::Same)?,
            Self::Filter(expr) => {
                func(&expr.source, ChildScope::Same)?;
                func(&expr.predicate, ChildScope::Nested)?;
            }
            Self::Map(expr) => {
                func(&expr.source, ChildScope::Same)?;
                func(&expr.projection, ChildScope::Nested)?;
            }
            Self::Sort(expr) => {
                func(&expr.source, ChildScope::Same)?;
                for key in &expr.keys {
                    func(&key.expr, ChildScope::Nested)?;
                }
            }
            Self::GroupBy(expr) => {
                func(&expr.source, ChildScope::Same)?;
                func(&expr.key, ChildScope::Nested)?;
                func(&expr.aggregate, ChildScope::Nested)?;
            }
            Self::Aggregate(expr) => {
                func(&expr.source, ChildScope::Same)?;
                if let Some(proj) = &expr.expr {
                    func(proj, ChildScope::Nested)?;
                }
            }
            Self::Distinct(expr) => func(&expr.source, ChildScope::Same)?,
            Self::Slice(expr) => func(&expr.source, ChildScope::Same)?,
            Self::One(expr) => {
                func(&expr.source, ChildScope::Same)?;
                if let Some(default) = &expr.default {
                    func(default, ChildScope::Same)?;
                }
            }
        }
        Ok(())
    }

    pub fn as_context(&self) -> Option<&ContextExpr> {
        match self {
            Self::Context(expr) => Some(expr),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(expr) => Some(&expr.literal),
            _ => None,
        }
    }

    pub fn field(self, name: impl Into<String>) -> Result<Expression> {
        field(self, name)
    }

    /// Keep the elements for which `predicate` is true.
    pub fn filter(self, predicate: impl Into<Expression>) -> Result<Expression> {
        Expression::Filter(FilterExpr {
            source: Box::new(self),
            predicate: Box::new(predicate.into()),
        })
        .checked()
    }

    pub fn map(self, projection: impl Into<Expression>) -> Result<Expression> {
        Expression::Map(MapExpr {
            source: Box::new(self),
            projection: Box::new(projection.into()),
            datatype: DataType::Any,
        })
        .checked()
    }

    pub fn sort(self, keys: impl IntoIterator<Item = SortKey>) -> Result<Expression> {
        let keys: Vec<_> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(DbError::with_kind(
                ErrorKind::InvalidExpression,
                "Sort requires at least one key",
            ));
        }
        Expression::Sort(SortExpr {
            source: Box::new(self),
            keys,
        })
        .checked()
    }

    /// Group elements by `key`, evaluating `aggregate` over each group.
    ///
    /// The context in `aggregate` is bound to the list of elements in the
    /// group, e.g. `context().sum_of(context().field("id")?)`.
    pub fn group_by(
        self,
        key: impl Into<Expression>,
        aggregate: impl Into<Expression>,
    ) -> Result<Expression> {
        Expression::GroupBy(GroupByExpr {
            source: Box::new(self),
            key: Box::new(key.into()),
            aggregate: Box::new(aggregate.into()),
            datatype: DataType::Any,
        })
        .checked()
    }

    fn aggregate(self, op: AggregateOperator, expr: Option<Expression>) -> Result<Expression> {
        Expression::Aggregate(AggregateExpr {
            op,
            source: Box::new(self),
            expr: expr.map(Box::new),
            datatype: DataType::Any,
        })
        .checked()
    }

    pub fn sum(self) -> Result<Expression> {
        self.aggregate(AggregateOperator::Sum, None)
    }

    pub fn sum_of(self, expr: impl Into<Expression>) -> Result<Expression> {
        self.aggregate(AggregateOperator::Sum, Some(expr.into()))
    }

    pub fn min(self) -> Result<Expression> {
        self.aggregate(AggregateOperator::Min, None)
    }

    pub fn min_of(self, expr: impl Into<Expression>) -> Result<Expression> {
        self.aggregate(AggregateOperator::Min, Some(expr.into()))
    }

    pub fn max(self) -> Result<Expression> {
        self.aggregate(AggregateOperator::Max, None)
    }

    pub fn max_of(self, expr: impl Into<Expression>) -> Result<Expression> {
        self.aggregate(AggregateOperator::Max, Some(expr.into()))
    }

    pub fn avg(self) -> Result<Expression> {
        self.aggregate(AggregateOperator::Avg, None)
    }

    pub fn avg_of(self, expr: impl Into<Expression>) -> Result<Expression> {
        self.aggregate(AggregateOperator::Avg, Some(expr.into()))
    }

    pub fn count(self) -> Result<Expression> {
        self.aggregate(AggregateOperator::Count, None)
    }

    /// Count elements for which `expr` isn't null.
    pub fn count_of(self, expr: impl Into<Expression>) -> Result<Expression> {
        self.aggregate(AggregateOperator::Count, Some(expr.into()))
    }

    pub fn len(self) -> Result<Expression> {
        self.aggregate(AggregateOperator::Len, None)
    }

    pub fn distinct(self) -> Result<Expression> {
        Expression::Distinct(DistinctExpr {
            source: Box::new(self),
        })
        .checked()
    }

    pub fn slice(self, start: usize, stop: Option<usize>) -> Result<Expression> {
        Expression::Slice(SliceExpr {
            source: Box::new(self),
            start,
            stop,
        })
        .checked()
    }

    /// The only element of the sequence. Errors during evaluation if there
    /// isn't exactly one.
    pub fn one(self) -> Result<Expression> {
        Expression::One(OneExpr {
            source: Box::new(self),
            default: None,
            datatype: DataType::Any,
        })
        .checked()
    }

    /// Like `one`, but produces `default` for an empty sequence.
    pub fn one_or(self, default: impl Into<Expression>) -> Result<Expression> {
        Expression::One(OneExpr {
            source: Box::new(self),
            default: Some(Box::new(default.into())),
            datatype: DataType::Any,
        })
        .checked()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context(expr) => expr.fmt(f),
            Self::Literal(expr) => expr.fmt(f),
            Self::Field(expr) => expr.fmt(f),
            Self::Comparison(expr) => expr.fmt(f),
            Self::Boolean(expr) => expr.fmt(f),
            Self::Negate(expr) => expr.fmt(f),
            Self::Arith(expr) => expr.fmt(f),
            Self::Merge(expr) => expr.fmt(f),
            Self::Record(expr) => expr.fmt(f),
            Self::Function(expr) => expr.fmt(f),
            Self::Filter(expr) => expr.fmt(f),
            Self::Map(expr) => expr.fmt(f),
            Self::Sort(expr) => expr.fmt(f),
            Self::GroupBy(expr) => expr.fmt(f),
            Self::Aggregate(expr) => expr.fmt(f),
            Self::Distinct(expr) => expr.fmt(f),
            Self::Slice(expr) => expr.fmt(f),
            Self::One(expr) => expr.fmt(f),
        }
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        lit(value)
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        lit(value)
    }
}

impl From<i32> for Expression {
    fn from(value: i32) -> Self {
        lit(value)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        lit(value)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        lit(value)
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        lit(value)
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        lit(value)
    }
}

/// The value bound at the innermost scope.
pub const fn context() -> Expression {
    parent(0)
}

/// The value bound `scope` levels above the innermost scope.
pub const fn parent(scope: usize) -> Expression {
    Expression::Context(ContextExpr {
        scope,
        datatype: DataType::Any,
    })
}

/// Context with a known type, used for the input of a tree.
pub fn typed_context(datatype: DataType) -> Expression {
    Expression::Context(ContextExpr { scope: 0, datatype })
}

pub fn lit(value: impl Into<Value>) -> Expression {
    Expression::Literal(LiteralExpr {
        literal: value.into(),
    })
}

pub fn field(base: impl Into<Expression>, name: impl Into<String>) -> Result<Expression> {
    Expression::Field(FieldExpr {
        base: Box::new(base.into()),
        name: name.into(),
        datatype: DataType::Any,
    })
    .checked()
}

fn comparison(
    op: ComparisonOperator,
    left: impl Into<Expression>,
    right: impl Into<Expression>,
) -> Result<Expression> {
    Expression::Comparison(ComparisonExpr {
        left: Box::new(left.into()),
        right: Box::new(right.into()),
        op,
    })
    .checked()
}

pub fn eq(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    comparison(ComparisonOperator::Eq, left, right)
}

pub fn ne(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    comparison(ComparisonOperator::NotEq, left, right)
}

pub fn lt(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    comparison(ComparisonOperator::Lt, left, right)
}

pub fn le(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    comparison(ComparisonOperator::LtEq, left, right)
}

pub fn gt(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    comparison(ComparisonOperator::Gt, left, right)
}

pub fn ge(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    comparison(ComparisonOperator::GtEq, left, right)
}

fn boolean(
    op: BooleanOperator,
    operands: impl IntoIterator<Item = Expression>,
) -> Result<Expression> {
    let operands: Vec<_> = operands.into_iter().collect();
    if operands.is_empty() {
        return Err(DbError::with_kind(
            ErrorKind::InvalidExpression,
            format!("'{op}' requires at least one operand"),
        ));
    }
    Expression::Boolean(BooleanExpr { op, operands }).checked()
}

pub fn and(operands: impl IntoIterator<Item = Expression>) -> Result<Expression> {
    boolean(BooleanOperator::And, operands)
}

pub fn or(operands: impl IntoIterator<Item = Expression>) -> Result<Expression> {
    boolean(BooleanOperator::Or, operands)
}

pub fn not(expr: impl Into<Expression>) -> Result<Expression> {
    Expression::Negate(NegateExpr {
        op: NegateOperator::Not,
        expr: Box::new(expr.into()),
    })
    .checked()
}

pub fn neg(expr: impl Into<Expression>) -> Result<Expression> {
    Expression::Negate(NegateExpr {
        op: NegateOperator::Negate,
        expr: Box::new(expr.into()),
    })
    .checked()
}

fn arith(
    op: ArithOperator,
    left: impl Into<Expression>,
    right: impl Into<Expression>,
) -> Result<Expression> {
    Expression::Arith(ArithExpr {
        op,
        left: Box::new(left.into()),
        right: Box::new(right.into()),
        datatype: DataType::Any,
    })
    .checked()
}

pub fn add(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    arith(ArithOperator::Add, left, right)
}

pub fn sub(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    arith(ArithOperator::Sub, left, right)
}

pub fn mul(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    arith(ArithOperator::Mul, left, right)
}

pub fn div(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    arith(ArithOperator::Div, left, right)
}

pub fn rem(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    arith(ArithOperator::Rem, left, right)
}

/// Combine two mappings, fields on the right replacing fields on the left.
pub fn merge(left: impl Into<Expression>, right: impl Into<Expression>) -> Result<Expression> {
    Expression::Merge(MergeExpr {
        left: Box::new(left.into()),
        right: Box::new(right.into()),
        datatype: DataType::Any,
    })
    .checked()
}

pub fn record<K, E>(fields: impl IntoIterator<Item = (K, E)>) -> Result<Expression>
where
    K: Into<String>,
    E: Into<Expression>,
{
    let mut out: Vec<(String, Expression)> = Vec::new();
    for (name, expr) in fields {
        let name = name.into();
        if out.iter().any(|(existing, _)| *existing == name) {
            return Err(DbError::with_kind(
                ErrorKind::InvalidExpression,
                format!("Duplicate record field '{name}'"),
            ));
        }
        out.push((name, expr.into()));
    }
    Expression::Record(RecordExpr {
        fields: out,
        datatype: DataType::Any,
    })
    .checked()
}

fn function(function: ScalarFunction, input: impl Into<Expression>) -> Result<Expression> {
    Expression::Function(FunctionExpr {
        function,
        input: Box::new(input.into()),
    })
    .checked()
}

pub fn upper(input: impl Into<Expression>) -> Result<Expression> {
    function(ScalarFunction::Upper, input)
}

pub fn lower(input: impl Into<Expression>) -> Result<Expression> {
    function(ScalarFunction::Lower, input)
}

pub fn length(input: impl Into<Expression>) -> Result<Expression> {
    function(ScalarFunction::Length, input)
}

/// Check if a string matches a regular expression anywhere.
pub fn matches(input: impl Into<Expression>, pattern: &str) -> Result<Expression> {
    function(ScalarFunction::Matches(Pattern::try_new(pattern)?), input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn people() -> Expression {
        let schema = Schema::builder("people")
            .with_identity("id", DataType::Int)
            .with_field("name", DataType::Text)
            .with_field("lastname", DataType::Text)
            .build()
            .unwrap();
        typed_context(DataType::list(DataType::Item(schema)))
    }

    #[test]
    fn structural_equality() {
        let a = add(lit(4), lit(5)).unwrap();
        let b = add(lit(4), lit(5)).unwrap();
        assert_eq!(a, b);

        let c = add(lit(5), lit(4)).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn display() {
        let expr = people()
            .filter(and([
                eq(context().field("name").unwrap(), "foo").unwrap(),
                lt(context().field("id").unwrap(), 3).unwrap(),
            ])
            .unwrap())
            .unwrap()
            .map(context().field("id").unwrap())
            .unwrap();
        assert_eq!(
            "c.filter(((c.name == 'foo') & (c.id < 3))).map(c.id)",
            expr.to_string()
        );
    }

    #[test]
    fn filter_keeps_item_type() {
        let all = people();
        let filtered = all
            .clone()
            .filter(eq(context().field("name").unwrap(), "foo").unwrap())
            .unwrap();
        assert_eq!(all.datatype(), filtered.datatype());
    }

    #[test]
    fn map_projection_type() {
        let expr = people().map(context().field("name").unwrap()).unwrap();
        assert_eq!(DataType::list(DataType::Text), expr.datatype());
        assert_eq!(TypeClass::Sequence, expr.type_class());
    }

    #[test]
    fn unknown_field_in_predicate() {
        let err = people()
            .filter(eq(context().field("age").unwrap(), 4).unwrap())
            .unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn boolean_of_non_boolean() {
        let err = and([lit(1), lit(true)]).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));

        let err = people()
            .filter(and([context().field("name").unwrap()]).unwrap())
            .unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn filter_non_boolean_predicate() {
        let err = people().filter(context().field("id").unwrap()).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn ordering_incompatible_types() {
        let err = lt(lit("a"), lit(4)).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));

        // Equality is always allowed.
        eq(lit("a"), lit(4)).unwrap();
    }

    #[test]
    fn arith_on_mapping_rejected() {
        let doubled = record([("doubleid", context().field("id").unwrap())]).unwrap();
        let err = add(context(), doubled).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
        assert!(err.get_msg().contains("merge"));

        // Caught once the context gets bound to items as well.
        let err = people()
            .map(add(context(), context()).unwrap())
            .unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn merge_type() {
        let expr = people()
            .map(
                merge(
                    context(),
                    record([("doubleid", context().field("id").unwrap())]).unwrap(),
                )
                .unwrap(),
            )
            .unwrap();
        let elem = expr.datatype().element_type().unwrap();
        assert_eq!(DataType::Int, elem.field_type("doubleid").unwrap());
        assert_eq!(DataType::Text, elem.field_type("lastname").unwrap());
    }

    #[test]
    fn merge_requires_mappings() {
        let err = merge(lit(1), record([("a", 1)]).unwrap()).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn sequence_op_on_scalar() {
        let err = lit(4).filter(lit(true)).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));

        let err = lit("abc").sum().unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn sum_of_text_rejected() {
        let err = people().sum_of(context().field("name").unwrap()).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn group_by_type() {
        let expr = people()
            .group_by(
                context().field("name").unwrap(),
                context().sum_of(context().field("id").unwrap()).unwrap(),
            )
            .unwrap();
        let elem = expr.datatype().element_type().unwrap();
        assert_eq!(DataType::Text, elem.field_type("key").unwrap());
        assert_eq!(DataType::Int, elem.field_type("value").unwrap());
    }

    #[test]
    fn sort_requires_orderable_keys() {
        let err = people().sort([SortKey::asc(context())]).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));

        people()
            .sort([
                SortKey::desc(context().field("name").unwrap()),
                SortKey::asc(context().field("id").unwrap()),
            ])
            .unwrap();
    }

    #[test]
    fn parent_scope_type() {
        // Inside the predicate, parent(1) is the input of the tree.
        let expr = people()
            .filter(gt(parent(1).len().unwrap(), 2).unwrap())
            .unwrap();
        assert_eq!(TypeClass::Sequence, expr.type_class());
    }

    #[test]
    fn invalid_regex() {
        let err = matches(context(), "[").unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn duplicate_record_field() {
        let err = record([("a", 1), ("a", 2)]).unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn for_each_child_scopes() {
        let expr = people()
            .filter(eq(context().field("name").unwrap(), "foo").unwrap())
            .unwrap();

        let mut scopes = Vec::new();
        expr.for_each_child(&mut |_, scope| {
            scopes.push(scope);
            Ok(())
        })
        .unwrap();
        assert_eq!(vec![ChildScope::Same, ChildScope::Nested], scopes);
    }
}
