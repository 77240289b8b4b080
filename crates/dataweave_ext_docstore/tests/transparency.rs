//! Randomized checks that native execution never changes a result.

use dataweave_core::datasource::SourceRef;
use dataweave_core::expr::sort_expr::SortKey;
use dataweave_core::expr::{self, Expression, context};
use dataweave_core::schema::Schema;
use dataweave_core::values::{DataType, Value};
use dataweave_error::{ErrorKind, Result};
use dataweave_ext_docstore::DocStore;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const NAMES: [&str; 4] = ["foo", "bar", "baz", "qux"];

fn random_source(rng: &mut ChaCha8Rng) -> SourceRef {
    let schema = Schema::builder("people")
        .with_identity("id", DataType::Int)
        .with_field("name", DataType::Text)
        .with_field("score", DataType::Float)
        .with_field("active", DataType::Boolean)
        .build()
        .unwrap();
    let source = SourceRef::new(DocStore::new("people", schema));

    let count: i64 = rng.random_range(0..12);
    for id in 0..count {
        let name = match rng.random_range(0..5) {
            0 => Value::Null,
            n => Value::from(NAMES[n - 1]),
        };
        let score = match rng.random_range(0..4) {
            0 => Value::Null,
            _ => Value::Float(f64::from(rng.random_range(-20i32..20)) / 4.0),
        };
        source
            .create([
                ("id", Value::from(id)),
                ("name", name),
                ("score", score),
                ("active", Value::from(rng.random_bool(0.5))),
            ])
            .unwrap()
            .save()
            .unwrap();
    }
    source
}

fn field(name: &str) -> Expression {
    context().field(name).unwrap()
}

fn name_literal(rng: &mut ChaCha8Rng) -> Value {
    Value::from(NAMES[rng.random_range(0..NAMES.len())])
}

fn comparison(rng: &mut ChaCha8Rng) -> Expression {
    let ops: [fn(Expression, Expression) -> Result<Expression>; 6] =
        [expr::eq, expr::ne, expr::lt, expr::le, expr::gt, expr::ge];
    let op = ops[rng.random_range(0..ops.len())];
    match rng.random_range(0..5) {
        0 => op(field("id"), expr::lit(rng.random_range(0..12i64))).unwrap(),
        1 => op(field("score"), expr::lit(f64::from(rng.random_range(-5i32..5)))).unwrap(),
        2 => op(field("name"), expr::lit(name_literal(rng))).unwrap(),
        3 => expr::eq(field("active"), rng.random_bool(0.5)).unwrap(),
        _ => expr::eq(field("name"), Value::Null).unwrap(),
    }
}

/// Predicate that fails at runtime for some or all elements.
fn fallible(rng: &mut ChaCha8Rng) -> Expression {
    match rng.random_range(0..3) {
        0 => expr::eq(expr::rem(field("id"), 0).unwrap(), 1).unwrap(),
        1 => expr::lt(expr::mul(field("id"), i64::MAX).unwrap(), 0).unwrap(),
        _ => expr::gt(expr::add(field("id"), i64::MAX).unwrap(), 0).unwrap(),
    }
}

fn predicate(rng: &mut ChaCha8Rng, depth: usize) -> Expression {
    match rng.random_range(0..if depth > 1 { 2 } else { 7 }) {
        0 | 1 => comparison(rng),
        2 => expr::and([predicate(rng, depth + 1), predicate(rng, depth + 1)]).unwrap(),
        3 => expr::or([predicate(rng, depth + 1), predicate(rng, depth + 1)]).unwrap(),
        4 => expr::not(predicate(rng, depth + 1)).unwrap(),
        5 => fallible(rng),
        // Never executed natively.
        _ => expr::matches(field("name"), "^b").unwrap(),
    }
}

fn sequence(rng: &mut ChaCha8Rng) -> Expression {
    let mut query = context();
    for _ in 0..rng.random_range(0..4) {
        query = match rng.random_range(0..3) {
            0 => query.filter(predicate(rng, 0)).unwrap(),
            1 => {
                let keys = ["id", "name", "score", "active"];
                let key = field(keys[rng.random_range(0..keys.len())]);
                let key = if rng.random_bool(0.5) {
                    SortKey::asc(key)
                } else {
                    SortKey::desc(key)
                };
                query.sort([key]).unwrap()
            }
            _ => {
                let start = rng.random_range(0..3);
                let stop = rng.random_bool(0.5).then(|| start + rng.random_range(0..5));
                query.slice(start, stop).unwrap()
            }
        };
    }
    query
}

fn random_query(rng: &mut ChaCha8Rng) -> Expression {
    let query = sequence(rng);
    match rng.random_range(0..12) {
        0 => query.map(field("name")).unwrap(),
        1 => query
            .map(expr::record([("upper", expr::upper(field("name")).unwrap())]).unwrap())
            .unwrap(),
        2 => query
            .map(
                expr::merge(
                    context(),
                    expr::record([("double", expr::mul(field("score"), 2).unwrap())]).unwrap(),
                )
                .unwrap(),
            )
            .unwrap(),
        3 => query.len().unwrap(),
        4 => query.sum_of(field("score")).unwrap(),
        5 => query.max_of(field("name")).unwrap(),
        6 => query.avg_of(field("score")).unwrap(),
        7 => query.count_of(field("score")).unwrap(),
        8 => query
            .group_by(field("name"), context().sum_of(field("id")).unwrap())
            .unwrap(),
        9 => query
            .group_by(
                field("active"),
                expr::record([
                    ("min", context().min_of(field("score")).unwrap()),
                    ("n", context().count().unwrap()),
                ])
                .unwrap(),
            )
            .unwrap(),
        _ => query,
    }
}

#[test]
fn native_matches_naive() {
    logutil::init_test();

    for seed in 0..200 {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let source = random_source(&mut rng);

        for _ in 0..10 {
            let query = random_query(&mut rng);
            let native = source.execute(&query).and_then(|output| output.into_value());
            let naive = source
                .execute_naive(&query)
                .and_then(|output| output.into_value());

            match (native, naive) {
                (Ok(native), Ok(naive)) => {
                    assert_eq!(naive, native, "seed {seed}: {query}")
                }
                (Err(native), Err(naive)) => {
                    assert_eq!(naive.kind(), native.kind(), "seed {seed}: {query}")
                }
                (native, naive) => {
                    panic!("seed {seed}: {query}\nnative: {native:?}\nnaive: {naive:?}")
                }
            }
        }
    }
}

#[test]
fn fallible_conjunct_not_skipped() {
    logutil::init_test();

    let schema = Schema::builder("people")
        .with_identity("id", DataType::Int)
        .with_field("name", DataType::Text)
        .build()
        .unwrap();
    let source = SourceRef::new(DocStore::new("people", schema));
    for (id, name) in [(1, "foo"), (2, "baz")] {
        source
            .create([("id", Value::from(id)), ("name", Value::from(name))])
            .unwrap()
            .save()
            .unwrap();
    }

    let division = expr::eq(expr::div(field("id"), 0).unwrap(), 1).unwrap();
    let nobody = expr::eq(field("name"), "nobody").unwrap();

    // Division by zero is hit before the name is checked.
    let query = source
        .all()
        .filter(expr::and([division.clone(), nobody.clone()]).unwrap())
        .unwrap();
    let native = source.execute(&query).and_then(|o| o.into_value());
    let naive = source.execute_naive(&query).and_then(|o| o.into_value());
    assert_eq!(ErrorKind::Arithmetic, naive.unwrap_err().kind());
    assert_eq!(ErrorKind::Arithmetic, native.unwrap_err().kind());

    // The name check short-circuits the division.
    let query = source
        .all()
        .filter(expr::and([nobody, division]).unwrap())
        .unwrap();
    let native = source.execute(&query).and_then(|o| o.into_value()).unwrap();
    let naive = source.execute_naive(&query).and_then(|o| o.into_value()).unwrap();
    assert_eq!(Value::List(Vec::new()), naive);
    assert_eq!(naive, native);
}
