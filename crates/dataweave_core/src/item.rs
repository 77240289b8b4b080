//! Schema-bound records.
//!
//! An item always carries exactly the fields of its source's schema. Field
//! values may be deferred, in which case they're loaded (once) on first
//! access.

use std::fmt;
use std::sync::Arc;

use dataweave_error::{DbError, ErrorKind, Result};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use crate::datasource::SourceRef;
use crate::schema::SchemaRef;
use crate::values::{Record, Value};

/// Field values keyed by property name, as stored by a data source.
pub type Row = IndexMap<String, Value>;

/// Computes the value of a deferred field from the item it belongs to.
pub type Loader = Arc<dyn Fn(&Item) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
enum Slot {
    Resolved(Value),
    Deferred(Loader),
}

/// A record bound to a data source.
///
/// Cloning an item is cheap and produces a handle to the same record.
#[derive(Clone)]
pub struct Item {
    inner: Arc<ItemInner>,
}

struct ItemInner {
    source: SourceRef,
    slots: Mutex<IndexMap<String, Slot>>,
}

impl Item {
    /// Create a new item from a row and a set of deferred field loaders.
    ///
    /// Fields that appear neither in the row nor in the loaders are set to
    /// null. A row value takes precedence over a loader for the same field.
    pub fn try_new(
        source: SourceRef,
        mut row: Row,
        loaders: impl IntoIterator<Item = (String, Loader)>,
    ) -> Result<Self> {
        let schema = source.properties();

        if let Some(name) = row.keys().find(|name| !schema.contains(name)) {
            return Err(unknown_property(name, schema));
        }

        let mut loaders: IndexMap<String, Loader> = loaders.into_iter().collect();
        if let Some(name) = loaders.keys().find(|name| !schema.contains(name)) {
            return Err(unknown_property(name, schema));
        }

        let mut slots = IndexMap::with_capacity(schema.len());
        for name in schema.field_names() {
            let slot = match row.swap_remove(name) {
                Some(value) => Slot::Resolved(value),
                None => match loaders.swap_remove(name) {
                    Some(loader) => Slot::Deferred(loader),
                    None => Slot::Resolved(Value::Null),
                },
            };
            slots.insert(name.to_string(), slot);
        }

        Ok(Item {
            inner: Arc::new(ItemInner {
                source,
                slots: Mutex::new(slots),
            }),
        })
    }

    pub fn source(&self) -> &SourceRef {
        &self.inner.source
    }

    pub fn schema(&self) -> &SchemaRef {
        self.inner.source.properties()
    }

    /// Get the value of a field, running its loader if it's deferred.
    ///
    /// Loaded values are memoized; the loader won't run again unless the
    /// field is replaced by another loader.
    pub fn get(&self, name: &str) -> Result<Value> {
        let loader = {
            let slots = self.inner.slots.lock();
            match slots.get(name) {
                Some(Slot::Resolved(value)) => return Ok(value.clone()),
                Some(Slot::Deferred(loader)) => loader.clone(),
                None => {
                    return Err(DbError::with_kind(
                        ErrorKind::UnknownField,
                        format!("Item has no field '{name}'"),
                    )
                    .with_field("source", self.source().name()));
                }
            }
        };

        // Lock is released while loading, loaders may read other fields.
        trace!(field = %name, source = %self.source().name(), "loading deferred field");
        let value = loader(self)?;

        let mut slots = self.inner.slots.lock();
        // Only memoize if the field wasn't assigned during the load.
        let unchanged = matches!(
            slots.get(name),
            Some(Slot::Deferred(current)) if Arc::ptr_eq(current, &loader)
        );
        if unchanged {
            slots.insert(name.to_string(), Slot::Resolved(value.clone()));
        }

        Ok(value)
    }

    /// Assign a field. Replaces any deferred loader for the field.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut slots = self.inner.slots.lock();
        match slots.get_mut(name) {
            Some(slot) => {
                *slot = Slot::Resolved(value.into());
                Ok(())
            }
            None => Err(DbError::with_kind(
                ErrorKind::UnknownField,
                format!("Cannot assign field '{name}' not in schema"),
            )
            .with_field("source", self.source().name())),
        }
    }

    /// Fields can never be removed from an item.
    pub fn remove(&self, name: &str) -> Result<()> {
        Err(DbError::with_kind(
            ErrorKind::ImmutableSchema,
            format!("Cannot remove field '{name}' from an item"),
        ))
    }

    /// Check if the schema has a field with this name.
    ///
    /// Never loads anything.
    pub fn contains(&self, name: &str) -> bool {
        self.schema().contains(name)
    }

    /// Check if a field currently holds a resolved value.
    pub fn is_loaded(&self, name: &str) -> bool {
        matches!(self.inner.slots.lock().get(name), Some(Slot::Resolved(_)))
    }

    pub fn field_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.schema().field_names()
    }

    pub fn len(&self) -> usize {
        self.schema().len()
    }

    pub fn is_empty(&self) -> bool {
        self.schema().is_empty()
    }

    /// Resolve and return every field in schema order.
    pub fn values(&self) -> Result<Vec<(String, Value)>> {
        self.field_names()
            .map(|name| Ok((name.to_string(), self.get(name)?)))
            .collect()
    }

    /// Resolve every field into a detached record.
    pub fn to_record(&self) -> Result<Record> {
        Ok(self.values()?.into_iter().collect())
    }

    /// Resolved row as stored by a data source.
    pub fn to_row(&self) -> Result<Row> {
        Ok(self.values()?.into_iter().collect())
    }

    /// Values of the identity fields, or None if the schema has no identity.
    pub fn identity(&self) -> Result<Option<Vec<(String, Value)>>> {
        let schema = self.schema();
        if !schema.has_identity() {
            return Ok(None);
        }
        let identity = schema
            .identity_properties()
            .map(|prop| Ok((prop.name.clone(), self.get(&prop.name)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(identity))
    }

    pub fn save(&self) -> Result<()> {
        self.inner.source.save(self)
    }

    pub fn delete(&self) -> Result<()> {
        self.inner.source.delete(self)
    }
}

fn unknown_property(name: &str, schema: &SchemaRef) -> DbError {
    DbError::with_kind(
        ErrorKind::SchemaMismatch,
        format!("Field '{name}' is not a property of the schema"),
    )
    .with_field("schema", schema.name())
}

fn is_complete(identity: &[(String, Value)]) -> bool {
    identity.iter().all(|(_, value)| !value.is_null())
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }

        // Within one source a complete identity decides. Items with a null
        // identity field (not saved yet, usually) compare by value.
        if self.source() == other.source() && self.schema().has_identity() {
            match (self.identity(), other.identity()) {
                (Ok(Some(a)), Ok(Some(b))) if is_complete(&a) && is_complete(&b) => {
                    return a == b;
                }
                (Err(_), _) | (_, Err(_)) => return false,
                _ => (),
            }
        }

        match (self.values(), other.values()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.inner.slots.lock();
        write!(f, "{{")?;
        for (idx, (name, slot)) in slots.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match slot {
                Slot::Resolved(value) => write!(f, "{name}: {value}")?,
                Slot::Deferred(_) => write!(f, "{name}: <deferred>")?,
            }
        }
        write!(f, "}}")
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Item({}) {self}", self.source().name())
    }
}
