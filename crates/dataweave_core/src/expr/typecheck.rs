//! Type inference and validation for expression trees.
//!
//! Types are derived relative to a stack of scope types, innermost last.
//! Children evaluated in a nested scope are re-derived with the element type
//! pushed onto the stack, which is where most errors in predicates and
//! projections get caught.

use dataweave_error::{DbError, ErrorKind, Result};

use super::Expression;
use super::aggregate_expr::AggregateOperator;
use super::arith_expr::ArithOperator;
use super::group_expr::{GROUP_KEY_FIELD, GROUP_VALUE_FIELD};
use super::negate_expr::NegateOperator;
use crate::values::{DataType, RecordType, TypeClass};

/// Get the type of an expression given the types of the enclosing scopes.
pub fn infer(expr: &Expression, scopes: &[DataType]) -> Result<DataType> {
    if scopes.is_empty() {
        // Already derived (and checked) when the node was built.
        return Ok(expr.datatype());
    }
    derive(expr, scopes)
}

fn invalid(msg: impl Into<String>, expr: &Expression) -> DbError {
    DbError::with_kind(ErrorKind::InvalidExpression, msg).with_field("expression", expr)
}

fn push_scope(scopes: &[DataType], datatype: DataType) -> Vec<DataType> {
    let mut scopes = scopes.to_vec();
    scopes.push(datatype);
    scopes
}

/// Derive the type of a node from its children, checking operand types.
pub(crate) fn derive(expr: &Expression, scopes: &[DataType]) -> Result<DataType> {
    match expr {
        Expression::Context(context) => {
            if context.scope < scopes.len() {
                Ok(scopes[scopes.len() - 1 - context.scope].clone())
            } else {
                Ok(context.datatype.clone())
            }
        }
        Expression::Literal(literal) => Ok(literal.literal.datatype()),
        Expression::Field(field) => infer(&field.base, scopes)?
            .field_type(&field.name)
            .map_err(|e| e.with_field("expression", expr)),
        Expression::Comparison(cmp) => {
            let left = infer(&cmp.left, scopes)?;
            let right = infer(&cmp.right, scopes)?;
            if cmp.op.is_ordering() && !left.is_order_comparable_with(&right) {
                return Err(invalid(
                    format!("Cannot order {left} against {right}"),
                    expr,
                ));
            }
            Ok(DataType::Boolean)
        }
        Expression::Boolean(boolean) => {
            for operand in &boolean.operands {
                let datatype = infer(operand, scopes)?;
                if !datatype.is_boolean_like() {
                    return Err(invalid(
                        format!("Operand of '{}' must be boolean, got {datatype}", boolean.op),
                        expr,
                    ));
                }
            }
            Ok(DataType::Boolean)
        }
        Expression::Negate(negate) => {
            let datatype = infer(&negate.expr, scopes)?;
            let numeric_like =
                datatype.is_numeric() || matches!(datatype, DataType::Any | DataType::Null);
            match negate.op {
                NegateOperator::Not if datatype.is_boolean_like() => Ok(DataType::Boolean),
                NegateOperator::Negate if numeric_like => Ok(datatype),
                _ => Err(invalid(format!("Cannot negate {datatype}"), expr)),
            }
        }
        Expression::Arith(arith) => {
            let left = infer(&arith.left, scopes)?;
            let right = infer(&arith.right, scopes)?;
            arith_type(arith.op, &left, &right).map_err(|e| e.with_field("expression", expr))
        }
        Expression::Merge(merge) => {
            let left = infer(&merge.left, scopes)?;
            let right = infer(&merge.right, scopes)?;
            let (Some(mut fields), Some(right_fields)) =
                (left.mapping_fields(), right.mapping_fields())
            else {
                return Err(invalid(
                    format!("Merge requires two mappings, got {left} and {right}"),
                    expr,
                ));
            };
            for (name, datatype) in right_fields.fields {
                fields.set_field(name, datatype);
            }
            fields.open |= right_fields.open;
            Ok(DataType::Record(fields))
        }
        Expression::Record(record) => {
            let fields = record
                .fields
                .iter()
                .map(|(name, field)| Ok((name.clone(), infer(field, scopes)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(DataType::Record(RecordType::closed(fields)))
        }
        Expression::Function(func) => {
            let input = infer(&func.input, scopes)?;
            func.function
                .check_input(&input)
                .map_err(|e| e.with_field("expression", expr))?;
            Ok(func.function.return_type())
        }
        Expression::Filter(filter) => {
            let elem = element_of(&filter.source, scopes)?;
            let predicate = derive(&filter.predicate, &push_scope(scopes, elem.clone()))?;
            if !predicate.is_boolean_like() {
                return Err(invalid(
                    format!("Filter predicate must be boolean, got {predicate}"),
                    expr,
                ));
            }
            Ok(DataType::list(elem))
        }
        Expression::Map(map) => {
            let elem = element_of(&map.source, scopes)?;
            let projection = derive(&map.projection, &push_scope(scopes, elem))?;
            Ok(DataType::list(projection))
        }
        Expression::Sort(sort) => {
            let elem = element_of(&sort.source, scopes)?;
            let nested = push_scope(scopes, elem.clone());
            for key in &sort.keys {
                let datatype = derive(&key.expr, &nested)?;
                if !datatype.is_orderable() {
                    return Err(invalid(format!("Cannot sort by {datatype}"), expr));
                }
            }
            Ok(DataType::list(elem))
        }
        Expression::GroupBy(group) => {
            let elem = element_of(&group.source, scopes)?;
            let key = derive(&group.key, &push_scope(scopes, elem.clone()))?;
            let aggregate = derive(&group.aggregate, &push_scope(scopes, DataType::list(elem)))?;
            Ok(DataType::list(DataType::Record(RecordType::closed([
                (GROUP_KEY_FIELD.to_string(), key),
                (GROUP_VALUE_FIELD.to_string(), aggregate),
            ]))))
        }
        Expression::Aggregate(agg) => {
            let elem = element_of(&agg.source, scopes)?;
            let input = match &agg.expr {
                Some(proj) => derive(proj, &push_scope(scopes, elem))?,
                None => elem,
            };
            aggregate_type(agg.op, &input).map_err(|e| e.with_field("expression", expr))
        }
        Expression::Distinct(distinct) => Ok(DataType::list(element_of(&distinct.source, scopes)?)),
        Expression::Slice(slice) => {
            if let Some(stop) = slice.stop {
                if stop < slice.start {
                    return Err(invalid("Slice stop before start", expr));
                }
            }
            Ok(DataType::list(element_of(&slice.source, scopes)?))
        }
        Expression::One(one) => {
            let elem = element_of(&one.source, scopes)?;
            match &one.default {
                Some(default) => Ok(elem.unify(&infer(default, scopes)?)),
                None => Ok(elem),
            }
        }
    }
}

fn element_of(source: &Expression, scopes: &[DataType]) -> Result<DataType> {
    infer(source, scopes)?
        .element_type()
        .map_err(|e| e.with_field("expression", source))
}

fn arith_type(op: ArithOperator, left: &DataType, right: &DataType) -> Result<DataType> {
    if left.type_class() == TypeClass::Mapping || right.type_class() == TypeClass::Mapping {
        return Err(DbError::with_kind(
            ErrorKind::InvalidExpression,
            format!("Cannot apply '{op}' to mappings, use merge to combine them"),
        ));
    }

    if left.is_any() || right.is_any() {
        return Ok(DataType::Any);
    }

    let is = |t: &DataType, want: &DataType| t == want || matches!(t, DataType::Null);
    let both_text = is(left, &DataType::Text) && is(right, &DataType::Text);
    match (left, right) {
        (DataType::Null, DataType::Null) => Ok(DataType::Null),
        _ if op == ArithOperator::Add && both_text => Ok(DataType::Text),
        (DataType::List(_) | DataType::Null, DataType::List(_) | DataType::Null)
            if op == ArithOperator::Add =>
        {
            Ok(left.unify(right))
        }
        _ if (left.is_numeric() || is(left, &DataType::Int))
            && (right.is_numeric() || is(right, &DataType::Int)) =>
        {
            if op == ArithOperator::Div
                || matches!(left, DataType::Float)
                || matches!(right, DataType::Float)
            {
                Ok(DataType::Float)
            } else {
                Ok(DataType::Int)
            }
        }
        _ => Err(DbError::with_kind(
            ErrorKind::InvalidExpression,
            format!("Cannot apply '{op}' to {left} and {right}"),
        )),
    }
}

fn aggregate_type(op: AggregateOperator, input: &DataType) -> Result<DataType> {
    let numeric_like = input.is_numeric() || matches!(input, DataType::Any | DataType::Null);
    match op {
        AggregateOperator::Count | AggregateOperator::Len => Ok(DataType::Int),
        AggregateOperator::Sum if numeric_like => match input {
            DataType::Null => Ok(DataType::Int),
            other => Ok(other.clone()),
        },
        AggregateOperator::Avg if numeric_like => Ok(DataType::Float),
        AggregateOperator::Min | AggregateOperator::Max if input.is_orderable() => {
            Ok(input.clone())
        }
        _ => Err(DbError::with_kind(
            ErrorKind::InvalidExpression,
            format!("Cannot compute '{op}' over {input}"),
        )),
    }
}
