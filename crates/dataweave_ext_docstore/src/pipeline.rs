//! Aggregation pipelines over JSON documents.
//!
//! A pipeline is a list of stages, each taking the full list of documents
//! output by the previous stage. Stage and operator names follow the usual
//! document database conventions so pipelines read familiarly when logged.
//! Values are compared, combined and aggregated with the same rules the
//! naive evaluator uses.

use std::cmp::Ordering;

use dataweave_core::eval::compare;
use dataweave_core::expr::comparison_expr::ComparisonOperator;
use dataweave_core::expr::function_expr::ScalarFunction;
use dataweave_core::values::{HashKey, Record, Value, compute};
use dataweave_error::{DbError, ErrorKind, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::convert::{Document, from_json, to_json};

pub const GROUP_ID_FIELD: &str = "_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Pipeline { stages }
    }

    pub fn push(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order over `docs`.
    pub fn execute(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        self.stages
            .iter()
            .try_fold(docs, |docs, stage| stage.apply(docs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "$match")]
    Match(Filter),
    /// Replace each document with an object of only these fields.
    #[serde(rename = "$project")]
    Project(IndexMap<String, Operand>),
    /// Add (or replace) fields on each document.
    #[serde(rename = "$addFields")]
    AddFields(IndexMap<String, Operand>),
    #[serde(rename = "$replaceWith")]
    ReplaceWith(Operand),
    /// Stable sort by fields, in order.
    #[serde(rename = "$sort")]
    Sort(IndexMap<String, SortDirection>),
    #[serde(rename = "$group")]
    Group(Group),
    /// Replace all documents with a single document holding their count.
    #[serde(rename = "$count")]
    Count(String),
    #[serde(rename = "$skip")]
    Skip(usize),
    #[serde(rename = "$limit")]
    Limit(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// Group documents by the value of `id`, one output document per group in
/// order of first occurrence. Groups everything together if there's no id,
/// producing nothing for empty input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: Option<Operand>,
    #[serde(flatten)]
    pub accumulators: IndexMap<String, Accumulator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    #[serde(rename = "$sum")]
    Sum(Operand),
    #[serde(rename = "$avg")]
    Avg(Operand),
    #[serde(rename = "$min")]
    Min(Operand),
    #[serde(rename = "$max")]
    Max(Operand),
    /// Number of documents, or of non-null values of the operand.
    #[serde(rename = "$count")]
    Count(Option<Operand>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    #[serde(rename = "$and")]
    And(Vec<Filter>),
    #[serde(rename = "$or")]
    Or(Vec<Filter>),
    /// Compare a field against a constant. A comparison producing null
    /// doesn't match.
    #[serde(rename = "$cmp")]
    Compare {
        field: String,
        op: CompareOp,
        value: Json,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
}

impl From<ComparisonOperator> for CompareOp {
    fn from(op: ComparisonOperator) -> Self {
        match op {
            ComparisonOperator::Eq => Self::Eq,
            ComparisonOperator::NotEq => Self::Ne,
            ComparisonOperator::Lt => Self::Lt,
            ComparisonOperator::LtEq => Self::Lte,
            ComparisonOperator::Gt => Self::Gt,
            ComparisonOperator::GtEq => Self::Gte,
        }
    }
}

impl From<CompareOp> for ComparisonOperator {
    fn from(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq => Self::Eq,
            CompareOp::Ne => Self::NotEq,
            CompareOp::Lt => Self::Lt,
            CompareOp::Lte => Self::LtEq,
            CompareOp::Gt => Self::Gt,
            CompareOp::Gte => Self::GtEq,
        }
    }
}

/// Computes a value from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// The document itself.
    #[serde(rename = "$$ROOT")]
    Root,
    #[serde(rename = "$field")]
    Field(String),
    #[serde(rename = "$literal")]
    Literal(Json),
    #[serde(rename = "$add")]
    Add(Box<Operand>, Box<Operand>),
    #[serde(rename = "$subtract")]
    Subtract(Box<Operand>, Box<Operand>),
    #[serde(rename = "$multiply")]
    Multiply(Box<Operand>, Box<Operand>),
    #[serde(rename = "$concat")]
    Concat(Box<Operand>, Box<Operand>),
    #[serde(rename = "$toUpper")]
    ToUpper(Box<Operand>),
    #[serde(rename = "$toLower")]
    ToLower(Box<Operand>),
    #[serde(rename = "$object")]
    Object(IndexMap<String, Operand>),
    /// Combine objects, later fields replacing earlier ones.
    #[serde(rename = "$mergeObjects")]
    MergeObjects(Vec<Operand>),
}

impl Operand {
    pub fn field(name: impl Into<String>) -> Self {
        Operand::Field(name.into())
    }

    pub fn eval(&self, doc: &Document) -> Result<Value> {
        Ok(match self {
            Self::Root => from_json(doc),
            Self::Field(name) => doc.get(name).map(from_json).unwrap_or(Value::Null),
            Self::Literal(json) => from_json(json),
            Self::Add(left, right) | Self::Concat(left, right) => {
                compute::add(&left.eval(doc)?, &right.eval(doc)?)?
            }
            Self::Subtract(left, right) => compute::sub(&left.eval(doc)?, &right.eval(doc)?)?,
            Self::Multiply(left, right) => compute::mul(&left.eval(doc)?, &right.eval(doc)?)?,
            Self::ToUpper(input) => ScalarFunction::Upper.apply(&input.eval(doc)?)?,
            Self::ToLower(input) => ScalarFunction::Lower.apply(&input.eval(doc)?)?,
            Self::Object(fields) => {
                let mut record = Record::new();
                for (name, field) in fields {
                    record.insert(name.clone(), field.eval(doc)?);
                }
                Value::Record(record)
            }
            Self::MergeObjects(operands) => {
                let mut record = Record::new();
                for operand in operands {
                    for (name, value) in operand.eval(doc)?.try_mapping_entries()? {
                        record.insert(name, value);
                    }
                }
                Value::Record(record)
            }
        })
    }
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> Result<bool> {
        match self {
            Self::And(filters) => {
                for filter in filters {
                    if !filter.matches(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(filters) => {
                for filter in filters {
                    if filter.matches(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Compare { field, op, value } => {
                let left = doc.get(field).map(from_json).unwrap_or(Value::Null);
                compare((*op).into(), &left, &from_json(value))?.try_as_predicate()
            }
        }
    }
}

impl Stage {
    pub fn apply(&self, mut docs: Vec<Document>) -> Result<Vec<Document>> {
        Ok(match self {
            Self::Match(filter) => {
                let mut matched = Vec::with_capacity(docs.len());
                for doc in docs {
                    if filter.matches(&doc)? {
                        matched.push(doc);
                    }
                }
                matched
            }
            Self::Project(fields) => {
                let object = Operand::Object(fields.clone());
                docs.iter()
                    .map(|doc| to_json(&object.eval(doc)?))
                    .collect::<Result<_>>()?
            }
            Self::AddFields(fields) => docs
                .into_iter()
                .map(|doc| add_fields(doc, fields))
                .collect::<Result<_>>()?,
            Self::ReplaceWith(operand) => docs
                .iter()
                .map(|doc| to_json(&operand.eval(doc)?))
                .collect::<Result<_>>()?,
            Self::Sort(fields) => sort(docs, fields)?,
            Self::Group(group) => group.apply(docs)?,
            Self::Count(name) => {
                let mut doc = Map::new();
                doc.insert(name.clone(), Json::from(docs.len()));
                vec![Json::Object(doc)]
            }
            Self::Skip(n) => {
                docs.drain(..(*n).min(docs.len()));
                docs
            }
            Self::Limit(n) => {
                docs.truncate(*n);
                docs
            }
        })
    }
}

fn add_fields(doc: Document, fields: &IndexMap<String, Operand>) -> Result<Document> {
    let values = fields
        .iter()
        .map(|(name, operand)| Ok((name.clone(), to_json(&operand.eval(&doc)?)?)))
        .collect::<Result<Vec<_>>>()?;
    let Json::Object(mut map) = doc else {
        return Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            "Cannot add fields to a document that isn't an object",
        ));
    };
    for (name, value) in values {
        map.insert(name, value);
    }
    Ok(Json::Object(map))
}

fn sort(docs: Vec<Document>, fields: &IndexMap<String, SortDirection>) -> Result<Vec<Document>> {
    let mut keyed: Vec<(Vec<Value>, Document)> = docs
        .into_iter()
        .map(|doc| {
            let keys = fields
                .keys()
                .map(|name| doc.get(name).map(from_json).unwrap_or(Value::Null))
                .collect();
            (keys, doc)
        })
        .collect();

    let mut error = None;
    keyed.sort_by(|(a, _), (b, _)| {
        for ((a, b), direction) in a.iter().zip(b.iter()).zip(fields.values()) {
            match a.try_cmp(b) {
                Ok(Ordering::Equal) => continue,
                Ok(ord) if *direction == SortDirection::Ascending => return ord,
                Ok(ord) => return ord.reverse(),
                Err(e) => {
                    error.get_or_insert(e);
                    return Ordering::Equal;
                }
            }
        }
        Ordering::Equal
    });
    if let Some(error) = error {
        return Err(error);
    }

    Ok(keyed.into_iter().map(|(_, doc)| doc).collect())
}

impl Group {
    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        let mut groups: IndexMap<HashKey, Vec<AccumulatorState>> = IndexMap::new();
        for doc in &docs {
            let key = match &self.id {
                Some(id) => id.eval(doc)?,
                None => Value::Null,
            };
            let states = groups.entry(HashKey::try_new(key)?).or_insert_with(|| {
                self.accumulators
                    .values()
                    .map(AccumulatorState::new)
                    .collect()
            });
            for (state, acc) in states.iter_mut().zip(self.accumulators.values()) {
                state.update(acc, doc)?;
            }
        }

        groups
            .into_iter()
            .map(|(key, states)| {
                let mut doc = Map::with_capacity(states.len() + 1);
                doc.insert(GROUP_ID_FIELD.to_string(), to_json(key.value())?);
                for (name, state) in self.accumulators.keys().zip(states) {
                    doc.insert(name.clone(), to_json(&state.finish(name)?)?);
                }
                Ok(Json::Object(doc))
            })
            .collect()
    }
}

enum AccumulatorState {
    Sum(Value),
    Avg { sum: f64, count: usize },
    Best(Option<Value>),
    Count(i64),
}

impl AccumulatorState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => Self::Sum(Value::Int(0)),
            Accumulator::Avg(_) => Self::Avg { sum: 0.0, count: 0 },
            Accumulator::Min(_) | Accumulator::Max(_) => Self::Best(None),
            Accumulator::Count(_) => Self::Count(0),
        }
    }

    fn update(&mut self, acc: &Accumulator, doc: &Document) -> Result<()> {
        match (self, acc) {
            (Self::Sum(sum), Accumulator::Sum(operand)) => match operand.eval(doc)? {
                Value::Null => (),
                value @ (Value::Int(_) | Value::Float(_)) => *sum = compute::add(sum, &value)?,
                other => return Err(non_numeric("$sum", &other)),
            },
            (Self::Avg { sum, count }, Accumulator::Avg(operand)) => {
                match operand.eval(doc)? {
                    Value::Null => return Ok(()),
                    Value::Int(i) => *sum += i as f64,
                    Value::Float(f) => *sum += f,
                    other => return Err(non_numeric("$avg", &other)),
                }
                *count += 1;
            }
            (Self::Best(best), Accumulator::Min(operand) | Accumulator::Max(operand)) => {
                let want = match acc {
                    Accumulator::Min(_) => Ordering::Less,
                    _ => Ordering::Greater,
                };
                let value = operand.eval(doc)?;
                if value.is_null() {
                    return Ok(());
                }
                let replace = match best {
                    Some(current) => value.try_cmp(current)? == want,
                    None => true,
                };
                if replace {
                    *best = Some(value);
                }
            }
            (Self::Count(count), Accumulator::Count(operand)) => {
                let counted = match operand {
                    Some(operand) => !operand.eval(doc)?.is_null(),
                    None => true,
                };
                if counted {
                    *count += 1;
                }
            }
            _ => return Err(DbError::new("Accumulator state doesn't match accumulator")),
        }
        Ok(())
    }

    fn finish(self, name: &str) -> Result<Value> {
        match self {
            Self::Sum(sum) => Ok(sum),
            Self::Avg { sum, count } if count > 0 => Ok(Value::Float(sum / count as f64)),
            Self::Best(Some(best)) => Ok(best),
            Self::Count(count) => Ok(Value::Int(count)),
            Self::Avg { .. } | Self::Best(None) => Err(DbError::with_kind(
                ErrorKind::EmptyAggregation,
                format!("No values to accumulate for '{name}'"),
            )),
        }
    }
}

fn non_numeric(acc: &str, value: &Value) -> DbError {
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!("Cannot compute '{acc}' of a {} value", value.type_name()),
    )
}
