use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dataweave_error::{DbError, ErrorKind, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use super::{DataSource, RowStream};
use crate::item::{Item, Loader, Row};
use crate::schema::SchemaRef;
use crate::values::{HashKey, Value};

/// Data source keeping its records in memory.
///
/// Records are keyed by their identity fields, or by all of their fields if
/// the schema has no identity. Never executes anything natively.
#[derive(Debug)]
pub struct MemorySource {
    name: String,
    schema: SchemaRef,
    rows: Mutex<IndexMap<HashKey, Row>>,
    deferred: Vec<(String, LoaderEntry)>,
    scans: AtomicUsize,
}

#[derive(Clone)]
struct LoaderEntry(Loader);

impl std::fmt::Debug for LoaderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Loader")
    }
}

impl MemorySource {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        MemorySource {
            name: name.into(),
            schema,
            rows: Mutex::new(IndexMap::new()),
            deferred: Vec::new(),
            scans: AtomicUsize::new(0),
        }
    }

    /// Compute a property on access instead of storing it.
    pub fn with_deferred(mut self, name: impl Into<String>, loader: Loader) -> Self {
        self.deferred.push((name.into(), LoaderEntry(loader)));
        self
    }

    /// Number of full scans done so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    fn key(&self, item: &Item) -> Result<HashKey> {
        let values = match item.identity()? {
            Some(identity) => identity,
            None => item.values()?,
        };
        HashKey::try_new(Value::List(values.into_iter().map(|(_, v)| v).collect()))
    }

    /// Stored row for an item, leaving out deferred properties.
    fn stored_row(&self, item: &Item) -> Result<Row> {
        let mut row = Row::with_capacity(item.len());
        for name in item.field_names() {
            if self.deferred.iter().any(|(deferred, _)| deferred == name) {
                continue;
            }
            row.insert(name.to_string(), item.get(name)?);
        }
        Ok(row)
    }
}

impl DataSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn properties(&self) -> &SchemaRef {
        &self.schema
    }

    fn scan(&self) -> Result<RowStream> {
        self.scans.fetch_add(1, Ordering::Relaxed);
        // Snapshot, writes during iteration aren't observed.
        let rows: Vec<_> = self.rows.lock().values().cloned().collect();
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    fn save(&self, item: &Item) -> Result<()> {
        let key = self.key(item)?;
        let row = self.stored_row(item)?;
        debug!(source = %self.name, "saving item");
        // Replacing keeps the original position.
        self.rows.lock().insert(key, row);
        Ok(())
    }

    fn delete(&self, item: &Item) -> Result<()> {
        let key = self.key(item)?;
        match self.rows.lock().shift_remove(&key) {
            Some(_) => Ok(()),
            None => Err(DbError::with_kind(
                ErrorKind::DataSource,
                "Cannot delete an item that isn't stored",
            )
            .with_field("source", &self.name)),
        }
    }

    fn deferred_properties(&self) -> Vec<(String, Loader)> {
        self.deferred
            .iter()
            .map(|(name, LoaderEntry(loader))| (name.clone(), Arc::clone(loader)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::SourceRef;
    use crate::schema::Schema;
    use crate::values::DataType;

    fn schema(with_identity: bool) -> SchemaRef {
        let builder = Schema::builder("people");
        let builder = if with_identity {
            builder.with_identity("id", DataType::Int)
        } else {
            builder.with_field("id", DataType::Int)
        };
        builder.with_field("name", DataType::Text).build().unwrap()
    }

    fn names(source: &SourceRef) -> Vec<Value> {
        source
            .enumerate_all()
            .unwrap()
            .map(|v| v.unwrap().try_get_field("name").unwrap())
            .collect()
    }

    #[test]
    fn save_replaces_by_identity() {
        let source = SourceRef::new(MemorySource::new("people", schema(true)));
        source.create([("id", 1.into()), ("name", Value::from("foo"))]).unwrap().save().unwrap();
        source.create([("id", 2.into()), ("name", Value::from("bar"))]).unwrap().save().unwrap();
        source.create([("id", 1.into()), ("name", Value::from("baz"))]).unwrap().save().unwrap();

        assert_eq!(vec![Value::from("baz"), Value::from("bar")], names(&source));
    }

    #[test]
    fn save_without_identity_keys_on_all_fields() {
        let source = SourceRef::new(MemorySource::new("people", schema(false)));
        source.create([("id", 1.into()), ("name", Value::from("foo"))]).unwrap().save().unwrap();
        source.create([("id", 1.into()), ("name", Value::from("bar"))]).unwrap().save().unwrap();
        source.create([("id", 1.into()), ("name", Value::from("foo"))]).unwrap().save().unwrap();

        assert_eq!(vec![Value::from("foo"), Value::from("bar")], names(&source));
    }

    #[test]
    fn delete() {
        let source = SourceRef::new(MemorySource::new("people", schema(true)));
        let item = source.create([("id", 1.into()), ("name", Value::from("foo"))]).unwrap();
        item.save().unwrap();
        item.delete().unwrap();
        assert!(names(&source).is_empty());

        let err = item.delete().unwrap_err();
        assert!(err.is_kind(ErrorKind::DataSource));
    }

    #[test]
    fn save_to_other_source_rejected() {
        let a = SourceRef::new(MemorySource::new("a", schema(true)));
        let b = SourceRef::new(MemorySource::new("b", schema(true)));
        let item = a.create([("id", 1.into()), ("name", Value::from("foo"))]).unwrap();
        let err = b.save(&item).unwrap_err();
        assert!(err.is_kind(ErrorKind::DataSource));
    }

    #[test]
    fn create_checks_types() {
        let source = SourceRef::new(MemorySource::new("people", schema(true)));
        let err = source.create([("id", Value::from("one"))]).unwrap_err();
        assert!(err.is_kind(ErrorKind::TypeMismatch));

        let err = source.create([("age", Value::from(4))]).unwrap_err();
        assert!(err.is_kind(ErrorKind::SchemaMismatch));
    }

    #[test]
    fn deferred_property_not_stored() {
        let loader: Loader = Arc::new(|item: &Item| {
            let id = item.get("id")?.try_as_i64()?;
            Ok(Value::from(format!("user{id}")))
        });
        let source =
            SourceRef::new(MemorySource::new("people", schema(true)).with_deferred("name", loader));
        source.create([("id", 3)]).unwrap().save().unwrap();

        let item = source.enumerate_all().unwrap().next().unwrap().unwrap();
        let item = item.try_as_item().unwrap();
        assert!(!item.is_loaded("name"));
        assert_eq!(Value::from("user3"), item.get("name").unwrap());
    }

    #[test]
    fn created_item_has_deferred_property() {
        let loader: Loader = Arc::new(|item: &Item| {
            let id = item.get("id")?.try_as_i64()?;
            Ok(Value::from(format!("user{id}")))
        });
        let source =
            SourceRef::new(MemorySource::new("people", schema(true)).with_deferred("name", loader));

        let item = source.create([("id", 3)]).unwrap();
        assert!(!item.is_loaded("name"));
        assert_eq!(Value::from("user3"), item.get("name").unwrap());

        let item = source
            .create([("id", Value::from(4)), ("name", Value::from("given"))])
            .unwrap();
        assert_eq!(Value::from("given"), item.get("name").unwrap());
    }
}
