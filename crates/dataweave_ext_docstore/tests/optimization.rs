//! Queries over a store that refuses full scans, so each one must be
//! executed natively to succeed.

use std::sync::Arc;

use dataweave_core::datasource::SourceRef;
use dataweave_core::eval::Output;
use dataweave_core::expr::sort_expr::SortKey;
use dataweave_core::expr::{self, Expression, context};
use dataweave_core::schema::Schema;
use dataweave_core::values::{DataType, Record, Value};
use dataweave_ext_docstore::DocStore;

fn people() -> (SourceRef, Arc<DocStore>) {
    let schema = Schema::builder("people")
        .with_identity("id", DataType::Int)
        .with_field("name", DataType::Text)
        .with_field("lastname", DataType::Text)
        .build()
        .unwrap();
    let store = Arc::new(DocStore::new("people", schema).without_scans());
    let source = SourceRef::from_arc(store.clone());

    for (id, name, lastname) in [(1, "foo", "bar"), (2, "baz", "bar"), (3, "foo", "baz")] {
        source
            .create([
                ("id", Value::from(id)),
                ("name", Value::from(name)),
                ("lastname", Value::from(lastname)),
            ])
            .unwrap()
            .save()
            .unwrap();
    }

    (source, store)
}

fn field(name: &str) -> Expression {
    context().field(name).unwrap()
}

fn collect(output: Output) -> Vec<Value> {
    output.try_collect().unwrap()
}

fn ids(values: &[Value]) -> Vec<i64> {
    values
        .iter()
        .map(|v| v.try_get_field("id").unwrap().try_as_i64().unwrap())
        .collect()
}

#[test]
fn filters() {
    logutil::init_test();
    let (source, store) = people();

    let cases = [
        (expr::eq(field("name"), "foo").unwrap(), vec![1, 3]),
        (
            expr::and([
                expr::eq(field("name"), "foo").unwrap(),
                expr::eq(field("lastname"), "bar").unwrap(),
            ])
            .unwrap(),
            vec![1],
        ),
        (
            expr::or([
                expr::eq(field("name"), "baz").unwrap(),
                expr::eq(field("lastname"), "baz").unwrap(),
            ])
            .unwrap(),
            vec![2, 3],
        ),
        (expr::lt(field("id"), 2).unwrap(), vec![1]),
        (
            expr::and([
                expr::lt(field("id"), 3).unwrap(),
                expr::gt(field("id"), 1).unwrap(),
            ])
            .unwrap(),
            vec![2],
        ),
        (expr::ge(field("id"), 2).unwrap(), vec![2, 3]),
        (expr::le(field("id"), 2).unwrap(), vec![1, 2]),
        (expr::ne(field("id"), 2).unwrap(), vec![1, 3]),
    ];

    for (predicate, expected) in cases {
        let query = source.all().filter(predicate).unwrap();
        let items = collect(source.execute(&query).unwrap());
        assert_eq!(expected, ids(&items), "{query}");

        // Results are items of the store.
        for item in &items {
            assert_eq!(&source, item.try_as_item().unwrap().source());
        }
    }
    assert_eq!(0, store.scan_count());
}

#[test]
fn maps() {
    let (source, _) = people();

    let values = collect(source.execute(&source.all().map(field("name")).unwrap()).unwrap());
    assert_eq!(
        vec![Value::from("foo"), Value::from("baz"), Value::from("foo")],
        values
    );

    let query = source
        .all()
        .map(expr::record([("foo", field("name"))]).unwrap())
        .unwrap();
    let values = collect(source.execute(&query).unwrap());
    assert_eq!(
        Value::Record(Record::from_iter([("foo", "foo")])),
        values[0]
    );

    let query = query
        .filter(expr::eq(field("foo"), "baz").unwrap())
        .unwrap();
    assert_eq!(1, collect(source.execute(&query).unwrap()).len());

    let query = source
        .all()
        .map(
            expr::merge(
                context(),
                expr::record([("doubleid", expr::add(field("id"), field("id")).unwrap())]).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
    let values = collect(source.execute(&query).unwrap());
    assert_eq!(Value::Int(6), values[2].try_get_field("doubleid").unwrap());
    assert_eq!(Value::from("foo"), values[2].try_get_field("name").unwrap());

    let query = source
        .all()
        .map(
            expr::merge(
                context(),
                expr::record([("square", expr::mul(field("id"), field("id")).unwrap())]).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
    let values = collect(source.execute(&query).unwrap());
    let squares: Vec<_> = values
        .iter()
        .map(|v| v.try_get_field("square").unwrap())
        .collect();
    assert_eq!(vec![Value::Int(1), Value::Int(4), Value::Int(9)], squares);

    let query = source
        .all()
        .map(expr::merge(context(), context()).unwrap())
        .unwrap();
    let values = collect(source.execute(&query).unwrap());
    assert_eq!(
        Value::Record(Record::from_iter([
            ("id", Value::from(1)),
            ("name", Value::from("foo")),
            ("lastname", Value::from("bar")),
        ])),
        values[0]
    );
}

#[test]
fn sorts() {
    let (source, _) = people();

    let query = source.all().sort([SortKey::asc(field("name"))]).unwrap();
    let values = collect(
        source
            .execute(&query.map(field("name")).unwrap())
            .unwrap(),
    );
    assert_eq!(
        vec![Value::from("baz"), Value::from("foo"), Value::from("foo")],
        values
    );

    let query = source
        .all()
        .sort([SortKey::desc(field("name")), SortKey::desc(field("id"))])
        .unwrap();
    assert_eq!(vec![3, 1, 2], ids(&collect(source.execute(&query).unwrap())));
}

#[test]
fn aggregates() {
    let (source, store) = people();

    let cases = [
        (source.all().len().unwrap(), Value::Int(3)),
        (source.all().sum_of(field("id")).unwrap(), Value::Int(6)),
        (source.all().max_of(field("id")).unwrap(), Value::Int(3)),
        (source.all().min_of(field("id")).unwrap(), Value::Int(1)),
        (
            source
                .all()
                .filter(expr::eq(field("name"), "foo").unwrap())
                .unwrap()
                .len()
                .unwrap(),
            Value::Int(2),
        ),
    ];
    for (query, expected) in cases {
        let value = source.execute(&query).unwrap().into_value().unwrap();
        assert_eq!(expected, value, "{query}");
    }
    assert_eq!(5, store.native_execution_count());
}

#[test]
fn group_by() {
    let (source, _) = people();

    let query = source
        .all()
        .group_by(field("name"), context().sum_of(field("id")).unwrap())
        .unwrap();
    let values = collect(source.execute(&query).unwrap());
    assert_eq!(
        vec![
            Value::Record(Record::from_iter([
                ("key", Value::from("foo")),
                ("value", Value::Int(4)),
            ])),
            Value::Record(Record::from_iter([
                ("key", Value::from("baz")),
                ("value", Value::Int(2)),
            ])),
        ],
        values
    );

    let query = source
        .all()
        .group_by(
            field("name"),
            expr::record([
                ("max", context().max_of(field("id")).unwrap()),
                ("min", context().min_of(field("id")).unwrap()),
                ("sum", context().sum_of(field("id")).unwrap()),
            ])
            .unwrap(),
        )
        .unwrap();
    let values = collect(source.execute(&query).unwrap());
    assert_eq!(
        Value::Record(Record::from_iter([
            ("max", Value::Int(3)),
            ("min", Value::Int(1)),
            ("sum", Value::Int(4)),
        ])),
        values[0].try_get_field("value").unwrap()
    );
}

#[test]
fn partial_filter() {
    let (source, store) = people();

    let query = source
        .all()
        .filter(
            expr::and([
                expr::eq(field("lastname"), "bar").unwrap(),
                expr::matches(field("name"), "^b").unwrap(),
            ])
            .unwrap(),
        )
        .unwrap();
    assert_eq!(vec![2], ids(&collect(source.execute(&query).unwrap())));
    assert_eq!(1, store.native_execution_count());
}

#[test]
fn untranslatable_needs_scan() {
    let (source, _) = people();

    let query = source.all().distinct().unwrap();
    let err = source
        .execute(&query)
        .and_then(|output| output.try_collect())
        .unwrap_err();
    assert!(err.is_kind(dataweave_error::ErrorKind::DataSource));
}
