//! Translation of expression subtrees into pipelines.
//!
//! Only subtrees the pipeline engine evaluates exactly like the naive
//! evaluator are translated: the input must be the stored documents, field
//! types must be known from the schema (or from earlier stages), and every
//! value involved must survive a round trip through JSON. Anything else is
//! left to the naive evaluator.
//!
//! A filter whose predicate is a conjunction may be translated partially,
//! with the conjuncts that can't be expressed returned as a remainder.

use dataweave_core::expr::aggregate_expr::{AggregateExpr, AggregateOperator};
use dataweave_core::expr::arith_expr::ArithOperator;
use dataweave_core::expr::boolean_expr::BooleanOperator;
use dataweave_core::expr::comparison_expr::ComparisonOperator;
use dataweave_core::expr::filter_expr::FilterExpr;
use dataweave_core::expr::function_expr::ScalarFunction;
use dataweave_core::expr::group_expr::{GROUP_KEY_FIELD, GROUP_VALUE_FIELD, GroupByExpr};
use dataweave_core::expr::negate_expr::NegateOperator;
use dataweave_core::expr::{self, Expression};
use dataweave_core::schema::Schema;
use dataweave_core::values::{DataType, RecordType, Value};
use dataweave_error::Result;
use indexmap::IndexMap;

use crate::convert::{is_plain_type, to_json};
use crate::pipeline::{
    Accumulator,
    CompareOp,
    Filter,
    GROUP_ID_FIELD,
    Group,
    Operand,
    Pipeline,
    SortDirection,
    Stage,
};

/// Field holding the result of a scalar plan.
pub const VALUE_FIELD: &str = "value";

#[derive(Debug)]
pub enum Translation {
    Full(Plan),
    Partial { plan: Plan, remainder: Expression },
    Untranslatable,
}

#[derive(Debug)]
pub struct Plan {
    pub pipeline: Pipeline,
    pub output: PlanOutput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutput {
    /// Documents come out as stored.
    Rows,
    /// Each document is an output value.
    Values,
    /// The result is in `VALUE_FIELD` of the only output document. No
    /// output document means the result is `if_empty`, or that the naive
    /// evaluator should decide if that's None.
    Scalar { if_empty: Option<Value> },
}

/// Element type of the documents flowing between stages.
#[derive(Debug, Clone)]
enum Shape {
    /// Documents as stored.
    Stored(RecordType),
    Object(RecordType),
    Scalar(DataType),
}

impl Shape {
    fn fields(&self) -> Option<&RecordType> {
        match self {
            Self::Stored(fields) | Self::Object(fields) => Some(fields),
            Self::Scalar(_) => None,
        }
    }

    fn plain_field(&self, name: &str) -> Option<&DataType> {
        self.fields()?
            .field(name)
            .filter(|datatype| is_plain(datatype))
    }
}

fn is_plain(datatype: &DataType) -> bool {
    match datatype {
        DataType::Record(fields) => !fields.open && fields.fields.iter().all(|(_, t)| is_plain(t)),
        other => is_plain_type(other),
    }
}

fn is_numeric(datatype: &DataType) -> bool {
    matches!(datatype, DataType::Int | DataType::Float)
}

/// Context of the innermost scope.
fn is_element(expr: &Expression) -> bool {
    expr.as_context().is_some_and(|context| context.scope == 0)
}

/// Name of a field read directly off the element.
fn element_field(expr: &Expression) -> Option<&str> {
    match expr {
        Expression::Field(field) if is_element(&field.base) => Some(&field.name),
        _ => None,
    }
}

/// Type of `expr` if evaluating it over an element of `shape` can't fail.
///
/// Conjuncts left to the naive evaluator only see the elements the
/// translated conjuncts let through, so they must not be able to fail on
/// the ones filtered out.
fn infallible_type(expr: &Expression, shape: &Shape) -> Option<DataType> {
    match expr {
        Expression::Literal(literal) => Some(literal.literal.datatype()),
        Expression::Field(_) => shape.fields()?.field(element_field(expr)?).cloned(),
        Expression::Comparison(cmp) => {
            let left = infallible_type(&cmp.left, shape)?;
            let right = infallible_type(&cmp.right, shape)?;
            let ordered = |t: &DataType| is_plain_type(t) || matches!(t, DataType::Null);
            if cmp.op.is_ordering()
                && !(ordered(&left) && ordered(&right) && left.is_order_comparable_with(&right))
            {
                return None;
            }
            Some(DataType::Boolean)
        }
        Expression::Boolean(boolean) => {
            for operand in &boolean.operands {
                if !is_boolean(&infallible_type(operand, shape)?) {
                    return None;
                }
            }
            Some(DataType::Boolean)
        }
        Expression::Negate(negate) if negate.op == NegateOperator::Not => {
            is_boolean(&infallible_type(&negate.expr, shape)?).then_some(DataType::Boolean)
        }
        Expression::Function(func) => match infallible_type(&func.input, shape)? {
            DataType::Text | DataType::Null => Some(func.function.return_type()),
            _ => None,
        },
        _ => None,
    }
}

fn is_boolean(datatype: &DataType) -> bool {
    matches!(datatype, DataType::Boolean | DataType::Null)
}

#[derive(Debug)]
pub struct Translator<'a> {
    schema: &'a Schema,
}

impl<'a> Translator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Translator { schema }
    }

    pub fn translate(&self, expr: &Expression) -> Result<Translation> {
        if let Some(plan) = self.plan(expr) {
            return Ok(Translation::Full(plan));
        }
        if let Expression::Filter(filter) = expr {
            return self.split_filter(filter);
        }
        Ok(Translation::Untranslatable)
    }

    fn stored(&self) -> Shape {
        Shape::Stored(RecordType::closed(
            self.schema
                .properties()
                .map(|prop| (prop.name.clone(), prop.datatype.clone())),
        ))
    }

    fn plan(&self, expr: &Expression) -> Option<Plan> {
        if let Expression::Aggregate(agg) = expr {
            return self.aggregate(agg);
        }
        let (pipeline, shape) = self.sequence(expr)?;
        let output = match shape {
            Shape::Stored(_) => PlanOutput::Rows,
            _ => PlanOutput::Values,
        };
        Some(Plan { pipeline, output })
    }

    /// Translate the conjuncts that can be, leaving the rest to be applied
    /// to the output.
    fn split_filter(&self, filter: &FilterExpr) -> Result<Translation> {
        let Expression::Boolean(predicate) = filter.predicate.as_ref() else {
            return Ok(Translation::Untranslatable);
        };
        if predicate.op != BooleanOperator::And {
            return Ok(Translation::Untranslatable);
        }
        let Some((mut pipeline, shape)) = self.sequence(&filter.source) else {
            return Ok(Translation::Untranslatable);
        };

        let mut translated = Vec::new();
        let mut remaining = Vec::new();
        for operand in &predicate.operands {
            match self.predicate(operand, &shape) {
                Some(filter) => translated.push(filter),
                None => remaining.push(operand.clone()),
            }
        }
        if translated.is_empty() || remaining.is_empty() {
            return Ok(Translation::Untranslatable);
        }
        if !remaining
            .iter()
            .all(|operand| infallible_type(operand, &shape).is_some_and(|t| is_boolean(&t)))
        {
            return Ok(Translation::Untranslatable);
        }

        pipeline.push(Stage::Match(Filter::And(translated)));
        let remainder_predicate = match remaining.len() {
            1 => remaining.remove(0),
            _ => expr::and(remaining)?,
        };
        let remainder = expr::context().filter(remainder_predicate)?;
        let output = match shape {
            Shape::Stored(_) => PlanOutput::Rows,
            _ => PlanOutput::Values,
        };

        Ok(Translation::Partial {
            plan: Plan { pipeline, output },
            remainder,
        })
    }

    fn sequence(&self, expr: &Expression) -> Option<(Pipeline, Shape)> {
        match expr {
            expr if is_element(expr) => Some((Pipeline::default(), self.stored())),
            Expression::Filter(filter) => {
                let (mut pipeline, shape) = self.sequence(&filter.source)?;
                let predicate = self.predicate(&filter.predicate, &shape)?;
                pipeline.push(Stage::Match(predicate));
                Some((pipeline, shape))
            }
            Expression::Map(map) => {
                let (mut pipeline, shape) = self.sequence(&map.source)?;
                let (stage, shape) = self.projection(&map.projection, shape)?;
                if let Some(stage) = stage {
                    pipeline.push(stage);
                }
                Some((pipeline, shape))
            }
            Expression::Sort(sort) => {
                let (mut pipeline, shape) = self.sequence(&sort.source)?;
                let mut fields = IndexMap::new();
                for key in &sort.keys {
                    let name = element_field(&key.expr)?;
                    if !is_plain_type(shape.plain_field(name)?) {
                        return None;
                    }
                    let direction = if key.ascending {
                        SortDirection::Ascending
                    } else {
                        SortDirection::Descending
                    };
                    // A repeated key never decides anything.
                    fields.entry(name.to_string()).or_insert(direction);
                }
                pipeline.push(Stage::Sort(fields));
                Some((pipeline, shape))
            }
            Expression::Slice(slice) => {
                let (mut pipeline, shape) = self.sequence(&slice.source)?;
                if slice.start > 0 {
                    pipeline.push(Stage::Skip(slice.start));
                }
                if let Some(stop) = slice.stop {
                    pipeline.push(Stage::Limit(stop - slice.start));
                }
                Some((pipeline, shape))
            }
            Expression::GroupBy(group) => self.group(group),
            _ => None,
        }
    }

    fn projection(&self, projection: &Expression, shape: Shape) -> Option<(Option<Stage>, Shape)> {
        if is_element(projection) {
            return Some((None, shape));
        }

        match projection {
            Expression::Record(record) => {
                let mut fields = IndexMap::new();
                let mut types = Vec::new();
                for (name, field) in &record.fields {
                    let (operand, datatype) = self.operand(field, &shape)?;
                    fields.insert(name.clone(), operand);
                    types.push((name.clone(), datatype));
                }
                Some((
                    Some(Stage::Project(fields)),
                    Shape::Object(RecordType::closed(types)),
                ))
            }
            Expression::Merge(merge) if is_element(&merge.left) => {
                let Expression::Record(record) = merge.right.as_ref() else {
                    return self.replace_with(projection, &shape);
                };
                let mut types = self.whole_element(&shape)?;
                let mut fields = IndexMap::new();
                for (name, field) in &record.fields {
                    let (operand, datatype) = self.operand(field, &shape)?;
                    fields.insert(name.clone(), operand);
                    types.set_field(name.clone(), datatype);
                }
                Some((Some(Stage::AddFields(fields)), Shape::Object(types)))
            }
            _ => self.replace_with(projection, &shape),
        }
    }

    fn replace_with(
        &self,
        projection: &Expression,
        shape: &Shape,
    ) -> Option<(Option<Stage>, Shape)> {
        let (operand, datatype) = self.operand(projection, shape)?;
        let shape = match datatype {
            DataType::Record(fields) => Shape::Object(fields),
            other => Shape::Scalar(other),
        };
        Some((Some(Stage::ReplaceWith(operand)), shape))
    }

    /// Fields of the element when used as a whole in a merge. Stored
    /// documents qualify as long as every field converts back unchanged.
    fn whole_element(&self, shape: &Shape) -> Option<RecordType> {
        let fields = shape.fields()?;
        if fields.open || !fields.fields.iter().all(|(_, t)| is_plain(t)) {
            return None;
        }
        Some(fields.clone())
    }

    fn operand(&self, expr: &Expression, shape: &Shape) -> Option<(Operand, DataType)> {
        if is_element(expr) {
            return match shape {
                // Stored elements are items, which only a merge turns into
                // plain records.
                Shape::Stored(_) => None,
                Shape::Object(fields) if is_plain(&DataType::Record(fields.clone())) => {
                    Some((Operand::Root, DataType::Record(fields.clone())))
                }
                Shape::Scalar(datatype) if is_plain(datatype) => {
                    Some((Operand::Root, datatype.clone()))
                }
                _ => None,
            };
        }

        match expr {
            Expression::Field(_) => {
                let name = element_field(expr)?;
                let datatype = shape.plain_field(name)?;
                Some((Operand::field(name), datatype.clone()))
            }
            Expression::Literal(literal) => {
                let datatype = literal.literal.datatype();
                if !is_plain_type(&datatype) {
                    return None;
                }
                Some((Operand::Literal(to_json(&literal.literal).ok()?), datatype))
            }
            Expression::Arith(arith) => {
                let (left, left_type) = self.operand(&arith.left, shape)?;
                let (right, right_type) = self.operand(&arith.right, shape)?;
                let (left, right) = (Box::new(left), Box::new(right));
                if is_numeric(&left_type) && is_numeric(&right_type) {
                    let datatype = if left_type == DataType::Int && right_type == DataType::Int {
                        DataType::Int
                    } else {
                        DataType::Float
                    };
                    let operand = match arith.op {
                        ArithOperator::Add => Operand::Add(left, right),
                        ArithOperator::Sub => Operand::Subtract(left, right),
                        ArithOperator::Mul => Operand::Multiply(left, right),
                        // Division and remainder fail on zero.
                        ArithOperator::Div | ArithOperator::Rem => return None,
                    };
                    Some((operand, datatype))
                } else if arith.op == ArithOperator::Add
                    && left_type == DataType::Text
                    && right_type == DataType::Text
                {
                    Some((Operand::Concat(left, right), DataType::Text))
                } else {
                    None
                }
            }
            Expression::Function(func) => {
                let (input, datatype) = self.operand(&func.input, shape)?;
                if datatype != DataType::Text {
                    return None;
                }
                let operand = match func.function {
                    ScalarFunction::Upper => Operand::ToUpper(Box::new(input)),
                    ScalarFunction::Lower => Operand::ToLower(Box::new(input)),
                    _ => return None,
                };
                Some((operand, DataType::Text))
            }
            Expression::Record(record) => {
                let mut fields = IndexMap::new();
                let mut types = Vec::new();
                for (name, field) in &record.fields {
                    let (operand, datatype) = self.operand(field, shape)?;
                    fields.insert(name.clone(), operand);
                    types.push((name.clone(), datatype));
                }
                Some((
                    Operand::Object(fields),
                    DataType::Record(RecordType::closed(types)),
                ))
            }
            Expression::Merge(merge) => {
                let (left, mut types) = self.mapping_operand(&merge.left, shape)?;
                let (right, right_types) = self.mapping_operand(&merge.right, shape)?;
                for (name, datatype) in right_types.fields {
                    types.set_field(name, datatype);
                }
                Some((
                    Operand::MergeObjects(vec![left, right]),
                    DataType::Record(types),
                ))
            }
            _ => None,
        }
    }

    /// An operand producing a record, where the element counts as one.
    fn mapping_operand(&self, expr: &Expression, shape: &Shape) -> Option<(Operand, RecordType)> {
        if is_element(expr) {
            return Some((Operand::Root, self.whole_element(shape)?));
        }
        match self.operand(expr, shape)? {
            (operand, DataType::Record(fields)) => Some((operand, fields)),
            _ => None,
        }
    }

    fn predicate(&self, expr: &Expression, shape: &Shape) -> Option<Filter> {
        match expr {
            Expression::Comparison(cmp) => self.comparison(&cmp.left, &cmp.right, cmp.op, shape),
            Expression::Boolean(boolean) => {
                let filters = boolean
                    .operands
                    .iter()
                    .map(|operand| self.predicate(operand, shape))
                    .collect::<Option<Vec<_>>>()?;
                Some(match boolean.op {
                    BooleanOperator::And => Filter::And(filters),
                    BooleanOperator::Or => Filter::Or(filters),
                })
            }
            // Equality never produces null, so its negation is exact.
            Expression::Negate(negate) if negate.op == NegateOperator::Not => {
                match negate.expr.as_ref() {
                    Expression::Comparison(cmp) if !cmp.op.is_ordering() => {
                        self.comparison(&cmp.left, &cmp.right, cmp.op.negate(), shape)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn comparison(
        &self,
        left: &Expression,
        right: &Expression,
        op: ComparisonOperator,
        shape: &Shape,
    ) -> Option<Filter> {
        let (name, value, op) = match (element_field(left), right.as_literal()) {
            (Some(name), Some(value)) => (name, value, op),
            _ => match (left.as_literal(), element_field(right)) {
                (Some(value), Some(name)) => (name, value, op.flip()),
                _ => return None,
            },
        };

        let field_type = shape.plain_field(name)?;
        if !is_plain_type(field_type) {
            return None;
        }
        let value_type = value.datatype();
        if value.is_null() {
            if op.is_ordering() {
                return None;
            }
        } else if !is_plain_type(&value_type) {
            return None;
        }
        if op.is_ordering() && !field_type.is_order_comparable_with(&value_type) {
            return None;
        }

        Some(Filter::Compare {
            field: name.to_string(),
            op: op.into(),
            value: to_json(value).ok()?,
        })
    }

    fn aggregate(&self, agg: &AggregateExpr) -> Option<Plan> {
        let (mut pipeline, shape) = self.sequence(&agg.source)?;

        let counts_all = matches!(agg.op, AggregateOperator::Len)
            || (agg.op == AggregateOperator::Count && agg.expr.is_none());
        if counts_all {
            pipeline.push(Stage::Count(VALUE_FIELD.to_string()));
            return Some(Plan {
                pipeline,
                output: PlanOutput::Scalar {
                    if_empty: Some(Value::Int(0)),
                },
            });
        }

        let (accumulator, _) = self.accumulator(agg.op, agg.expr.as_deref(), &shape)?;
        pipeline.push(Stage::Group(Group {
            id: None,
            accumulators: IndexMap::from_iter([(VALUE_FIELD.to_string(), accumulator)]),
        }));
        let if_empty = match agg.op {
            AggregateOperator::Sum | AggregateOperator::Count => Some(Value::Int(0)),
            _ => None,
        };
        Some(Plan {
            pipeline,
            output: PlanOutput::Scalar { if_empty },
        })
    }

    fn accumulator(
        &self,
        op: AggregateOperator,
        projection: Option<&Expression>,
        shape: &Shape,
    ) -> Option<(Accumulator, DataType)> {
        let input = match projection {
            Some(projection) => Some(self.operand(projection, shape)?),
            None => match shape {
                Shape::Scalar(datatype) if is_plain(datatype) => {
                    Some((Operand::Root, datatype.clone()))
                }
                _ => None,
            },
        };

        match (op, input) {
            (AggregateOperator::Len, _) | (AggregateOperator::Count, None) => {
                Some((Accumulator::Count(None), DataType::Int))
            }
            (AggregateOperator::Count, Some((operand, _))) => {
                Some((Accumulator::Count(Some(operand)), DataType::Int))
            }
            (AggregateOperator::Sum, Some((operand, datatype))) if is_numeric(&datatype) => {
                Some((Accumulator::Sum(operand), datatype))
            }
            (AggregateOperator::Avg, Some((operand, datatype))) if is_numeric(&datatype) => {
                Some((Accumulator::Avg(operand), DataType::Float))
            }
            (AggregateOperator::Min, Some((operand, datatype))) if is_plain_type(&datatype) => {
                Some((Accumulator::Min(operand), datatype))
            }
            (AggregateOperator::Max, Some((operand, datatype))) if is_plain_type(&datatype) => {
                Some((Accumulator::Max(operand), datatype))
            }
            _ => None,
        }
    }

    /// Accumulator for an aggregate over the members of a group.
    fn group_accumulator(
        &self,
        expr: &Expression,
        shape: &Shape,
    ) -> Option<(Accumulator, DataType)> {
        match expr {
            Expression::Aggregate(agg) if is_element(&agg.source) => {
                self.accumulator(agg.op, agg.expr.as_deref(), shape)
            }
            _ => None,
        }
    }

    fn group(&self, group: &GroupByExpr) -> Option<(Pipeline, Shape)> {
        let (mut pipeline, shape) = self.sequence(&group.source)?;

        let (id, key_type) = match element_field(&group.key) {
            Some(name) => {
                let datatype = shape.plain_field(name)?;
                if !is_plain_type(datatype) {
                    return None;
                }
                (Operand::field(name), datatype.clone())
            }
            None => match (&shape, is_element(&group.key)) {
                (Shape::Scalar(datatype), true) if is_plain_type(datatype) => {
                    (Operand::Root, datatype.clone())
                }
                _ => return None,
            },
        };

        // Accumulators get generated names, record fields may be called
        // anything.
        let mut accumulators = IndexMap::new();
        let (value, value_type) = match group.aggregate.as_ref() {
            Expression::Record(record) => {
                let mut fields = IndexMap::new();
                let mut types = Vec::new();
                for (idx, (name, field)) in record.fields.iter().enumerate() {
                    let (accumulator, datatype) = self.group_accumulator(field, &shape)?;
                    let acc_name = format!("acc{idx}");
                    accumulators.insert(acc_name.clone(), accumulator);
                    fields.insert(name.clone(), Operand::Field(acc_name));
                    types.push((name.clone(), datatype));
                }
                (
                    Operand::Object(fields),
                    DataType::Record(RecordType::closed(types)),
                )
            }
            aggregate => {
                let (accumulator, datatype) = self.group_accumulator(aggregate, &shape)?;
                accumulators.insert("acc0".to_string(), accumulator);
                (Operand::field("acc0"), datatype)
            }
        };

        pipeline.push(Stage::Group(Group {
            id: Some(id),
            accumulators,
        }));
        pipeline.push(Stage::Project(IndexMap::from_iter([
            (GROUP_KEY_FIELD.to_string(), Operand::field(GROUP_ID_FIELD)),
            (GROUP_VALUE_FIELD.to_string(), value),
        ])));

        Some((
            pipeline,
            Shape::Object(RecordType::closed([
                (GROUP_KEY_FIELD.to_string(), key_type),
                (GROUP_VALUE_FIELD.to_string(), value_type),
            ])),
        ))
    }
}
