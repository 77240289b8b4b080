use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::*;
use crate::datasource::{DataSource, RowStream};
use crate::expr::aggregate_expr::AggregateOperator;
use crate::expr::sort_expr::SortKey;
use crate::expr::{self, context, parent};
use crate::item::{Item, Row};
use crate::schema::{Schema, SchemaRef};
use crate::values::{DataType, Record, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Decline,
    /// Executes filters over the input and counts of the input.
    Accept,
    /// Returns everything for filters, leaving the filtering to the caller.
    Partial,
    /// Accepts filters but returns every row.
    Wrong,
}

#[derive(Debug)]
struct TestSource {
    schema: SchemaRef,
    rows: Vec<Row>,
    mode: Mode,
    offered: Mutex<Vec<String>>,
    scans: AtomicUsize,
}

impl TestSource {
    fn new(mode: Mode) -> Self {
        let schema = Schema::builder("people")
            .with_identity("id", DataType::Int)
            .with_field("name", DataType::Text)
            .with_field("lastname", DataType::Text)
            .build()
            .unwrap();
        let rows = [(1, "foo", "bar"), (2, "baz", "bar"), (3, "foo", "baz")]
            .into_iter()
            .map(|(id, name, lastname)| {
                Row::from_iter([
                    ("id".to_string(), Value::from(id)),
                    ("name".to_string(), Value::from(name)),
                    ("lastname".to_string(), Value::from(lastname)),
                ])
            })
            .collect();
        TestSource {
            schema,
            rows,
            mode,
            offered: Mutex::new(Vec::new()),
            scans: AtomicUsize::new(0),
        }
    }

    fn rows(&self) -> RowStream {
        Box::new(self.rows.clone().into_iter().map(Ok))
    }

    fn matching(&self, predicate: &Expression) -> Result<Vec<Row>> {
        let mut matching = Vec::new();
        for row in &self.rows {
            let record = Value::Record(Record::from_iter(row.clone()));
            let keep = NaiveEvaluator::new()
                .run_with_value(predicate, record)?
                .into_value()?
                .try_as_predicate()?;
            if keep {
                matching.push(row.clone());
            }
        }
        Ok(matching)
    }
}

impl DataSource for TestSource {
    fn name(&self) -> &str {
        "people"
    }

    fn properties(&self) -> &SchemaRef {
        &self.schema
    }

    fn scan(&self) -> Result<RowStream> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows())
    }

    fn try_execute(&self, expr: &Expression) -> Result<Execution> {
        self.offered.lock().push(expr.to_string());

        let on_input = |source: &Expression| source.as_context().is_some_and(|c| c.scope == 0);
        match (self.mode, expr) {
            (Mode::Accept, Expression::Filter(filter)) if on_input(&filter.source) => {
                let rows = self.matching(&filter.predicate)?;
                Ok(Execution::Accepted(NativeOutput::Rows(Box::new(
                    rows.into_iter().map(Ok),
                ))))
            }
            (Mode::Accept, Expression::Aggregate(agg))
                if agg.op == AggregateOperator::Len && on_input(&agg.source) =>
            {
                Ok(Execution::Accepted(NativeOutput::Scalar(Value::from(
                    self.rows.len() as i64,
                ))))
            }
            (Mode::Partial, Expression::Filter(filter)) if on_input(&filter.source) => {
                Ok(Execution::Partial {
                    output: NativeOutput::Rows(self.rows()),
                    remainder: expr.clone(),
                })
            }
            (Mode::Wrong, Expression::Filter(filter)) if on_input(&filter.source) => {
                Ok(Execution::Accepted(NativeOutput::Rows(self.rows())))
            }
            _ => Ok(Execution::Declined),
        }
    }

    fn save(&self, _item: &Item) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _item: &Item) -> Result<()> {
        Ok(())
    }
}

fn setup(mode: Mode) -> (SourceRef, Arc<TestSource>) {
    let inner = Arc::new(TestSource::new(mode));
    (SourceRef::from_arc(inner.clone()), inner)
}

fn name() -> Expression {
    context().field("name").unwrap()
}

fn id() -> Expression {
    context().field("id").unwrap()
}

fn foo_ids() -> Expression {
    context()
        .filter(expr::eq(name(), "foo").unwrap())
        .unwrap()
        .map(id())
        .unwrap()
}

fn collect(output: Output) -> Vec<Value> {
    output.try_collect().unwrap()
}

#[test]
fn declined_falls_back_to_scan() {
    logutil::init_test();
    let (source, inner) = setup(Mode::Decline);

    let values = collect(source.execute(&foo_ids()).unwrap());
    assert_eq!(vec![Value::Int(1), Value::Int(3)], values);
    assert_eq!(1, inner.scans.load(Ordering::SeqCst));

    // Map offered first, then its source.
    let offered = inner.offered.lock().clone();
    assert_eq!(2, offered.len());
    assert!(offered[0].contains(".map("));
    assert!(offered[1].ends_with(".filter((c.name == 'foo'))"), "{}", offered[1]);
}

#[test]
fn accepted_subtree_skips_scan() {
    logutil::init_test();
    let (source, inner) = setup(Mode::Accept);

    let values = collect(source.execute(&foo_ids()).unwrap());
    assert_eq!(vec![Value::Int(1), Value::Int(3)], values);
    assert_eq!(0, inner.scans.load(Ordering::SeqCst));
}

#[test]
fn accepted_rows_become_items() {
    let (source, _inner) = setup(Mode::Accept);
    let expr = context().filter(expr::eq(id(), 2).unwrap()).unwrap();

    let values = collect(source.execute(&expr).unwrap());
    assert_eq!(1, values.len());
    let item = values[0].try_as_item().unwrap();
    assert_eq!(&source, item.source());
    assert_eq!(Value::from("baz"), item.get("name").unwrap());
}

#[test]
fn accepted_scalar() {
    let (source, inner) = setup(Mode::Accept);
    let expr = expr::add(context().len().unwrap(), 1).unwrap();

    let value = source.execute(&expr).unwrap().into_value().unwrap();
    assert_eq!(Value::Int(4), value);
    assert_eq!(0, inner.scans.load(Ordering::SeqCst));
}

#[test]
fn partial_remainder_evaluated() {
    let (source, inner) = setup(Mode::Partial);
    let expr = context()
        .filter(expr::gt(id(), 1).unwrap())
        .unwrap()
        .sort([SortKey::desc(id())])
        .unwrap();

    let values = collect(source.execute(&expr).unwrap());
    let ids: Vec<_> = values
        .iter()
        .map(|v| v.try_get_field("id").unwrap())
        .collect();
    assert_eq!(vec![Value::Int(3), Value::Int(2)], ids);
    assert_eq!(0, inner.scans.load(Ordering::SeqCst));
}

#[test]
fn optimizer_disabled() {
    let (source, inner) = setup(Mode::Accept);
    let config = ExecutionConfig {
        enable_optimizer: false,
        ..Default::default()
    };

    let values = collect(source.execute_with(&foo_ids(), &config).unwrap());
    assert_eq!(vec![Value::Int(1), Value::Int(3)], values);
    assert!(inner.offered.lock().is_empty());
    assert_eq!(1, inner.scans.load(Ordering::SeqCst));
}

#[test]
fn negotiation_depth_limit() {
    let (source, inner) = setup(Mode::Accept);
    let config = ExecutionConfig {
        max_negotiation_depth: 0,
        ..Default::default()
    };

    let values = collect(source.execute_with(&foo_ids(), &config).unwrap());
    assert_eq!(vec![Value::Int(1), Value::Int(3)], values);
    assert_eq!(1, inner.offered.lock().len());
    assert_eq!(1, inner.scans.load(Ordering::SeqCst));
}

#[test]
fn nested_input_reference_not_offered() {
    let (source, inner) = setup(Mode::Accept);
    let expr = context()
        .filter(expr::lt(id(), parent(1).len().unwrap()).unwrap())
        .unwrap();

    let values = collect(source.execute(&expr).unwrap());
    assert_eq!(2, values.len());
    assert!(inner.offered.lock().is_empty());
}

#[test]
fn input_read_twice_offered_separately() {
    let (source, inner) = setup(Mode::Accept);
    let expr = expr::record([
        ("count", context().len().unwrap()),
        (
            "foos",
            context()
                .filter(expr::eq(name(), "foo").unwrap())
                .unwrap()
                .len()
                .unwrap(),
        ),
    ])
    .unwrap();

    let value = source.execute(&expr).unwrap().into_value().unwrap();
    assert_eq!(
        Value::Record(Record::from_iter([("count", 3), ("foos", 2)])),
        value
    );
    assert_eq!(0, inner.scans.load(Ordering::SeqCst));
}

#[test]
fn verify_catches_wrong_results() {
    let (source, _inner) = setup(Mode::Wrong);
    let expr = context().filter(expr::eq(name(), "foo").unwrap()).unwrap();

    // Unverified, the wrong answer goes through.
    assert_eq!(3, collect(source.execute(&expr).unwrap()).len());

    let config = ExecutionConfig {
        verify_optimized: true,
        ..Default::default()
    };
    let err = source.execute_with(&expr, &config).unwrap_err();
    assert!(err.is_kind(ErrorKind::Internal));
}

#[test]
fn verify_passes_correct_results() {
    let (source, _inner) = setup(Mode::Accept);
    let config = ExecutionConfig {
        verify_optimized: true,
        ..Default::default()
    };
    let values = collect(source.execute_with(&foo_ids(), &config).unwrap());
    assert_eq!(vec![Value::Int(1), Value::Int(3)], values);
}
