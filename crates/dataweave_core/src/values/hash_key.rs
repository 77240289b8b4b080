use std::hash::{BuildHasher, Hash, Hasher};

use ahash::{AHasher, RandomState};
use dataweave_error::Result;

use super::value::{Value, canonical_f64};

pub const HASH_RANDOM_STATE: RandomState = RandomState::with_seeds(0, 0, 0, 0);

/// A value usable as a key in hash maps, e.g. for grouping and distinct.
///
/// Hashing is consistent with value equality: ints and floats that compare
/// equal hash the same, records hash independent of field order, and items
/// hash by their identity fields.
#[derive(Debug, Clone)]
pub struct HashKey {
    value: Value,
    hash: u64,
}

impl HashKey {
    /// Create a new key from a value.
    ///
    /// Errors if hashing requires resolving a deferred item field that fails
    /// to load.
    pub fn try_new(value: Value) -> Result<Self> {
        let hash = hash_value(&value)?;
        Ok(HashKey { value, hash })
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl PartialEq for HashKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.value == other.value
    }
}

impl Eq for HashKey {}

impl Hash for HashKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash)
    }
}

fn hash_value(value: &Value) -> Result<u64> {
    let mut hasher = HASH_RANDOM_STATE.build_hasher();
    write_value(value, &mut hasher)?;
    Ok(hasher.finish())
}

fn write_value(value: &Value, hasher: &mut AHasher) -> Result<()> {
    (Discriminant::of(value) as u8).hash(hasher);
    match value {
        Value::Null => (),
        Value::Boolean(b) => b.hash(hasher),
        Value::Int(i) => write_f64(*i as f64, hasher),
        Value::Float(f) => write_f64(*f, hasher),
        Value::Text(s) => s.hash(hasher),
        Value::Bytes(b) => b.hash(hasher),
        Value::Timestamp(ts) => ts.hash(hasher),
        Value::List(values) => {
            values.len().hash(hasher);
            for v in values {
                write_value(v, hasher)?;
            }
        }
        Value::Record(record) => {
            let entries = record.iter().map(|(name, v)| (name.to_string(), v.clone()));
            write_unordered(entries, hasher)?;
        }
        Value::Item(item) => {
            // Items from the same source compare by identity, so only the
            // identity fields may contribute.
            let entries = match item.identity()? {
                Some(identity) => identity,
                None => item.values()?,
            };
            write_unordered(entries.into_iter(), hasher)?;
        }
    }
    Ok(())
}

fn write_unordered(
    entries: impl Iterator<Item = (String, Value)>,
    hasher: &mut AHasher,
) -> Result<()> {
    let mut combined: u64 = 0;
    let mut count = 0;
    for (name, v) in entries {
        let mut entry_hasher = HASH_RANDOM_STATE.build_hasher();
        name.hash(&mut entry_hasher);
        write_value(&v, &mut entry_hasher)?;
        combined = combined.wrapping_add(entry_hasher.finish());
        count += 1;
    }
    count.hash(hasher);
    combined.hash(hasher);
    Ok(())
}

fn write_f64(f: f64, hasher: &mut AHasher) {
    canonical_f64(f).to_bits().hash(hasher);
}

/// Hashing class of a value. Ints and floats share one so that equal
/// numbers hash the same.
#[derive(Debug, Clone, Copy)]
enum Discriminant {
    Null,
    Boolean,
    Number,
    Text,
    Bytes,
    Timestamp,
    List,
    Mapping,
}

impl Discriminant {
    fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Boolean(_) => Self::Boolean,
            Value::Int(_) | Value::Float(_) => Self::Number,
            Value::Text(_) => Self::Text,
            Value::Bytes(_) => Self::Bytes,
            Value::Timestamp(_) => Self::Timestamp,
            Value::List(_) => Self::List,
            Value::Record(_) | Value::Item(_) => Self::Mapping,
        }
    }
}
