use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use dataweave_error::{DbError, ErrorKind, Result};

use super::datatype::DataType;
use super::record::Record;
use crate::item::Item;

/// A single value flowing through expression evaluation.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    List(Vec<Value>),
    Record(Record),
    Item(Item),
}

impl Value {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Boolean(_) => DataType::Boolean,
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Text(_) => DataType::Text,
            Self::Bytes(_) => DataType::Bytes,
            Self::Timestamp(_) => DataType::Timestamp,
            Self::List(values) => {
                let elem = values
                    .iter()
                    .map(|v| v.datatype())
                    .reduce(|acc, t| acc.unify(&t))
                    .unwrap_or(DataType::Null);
                DataType::list(elem)
            }
            Self::Record(record) => {
                DataType::Record(super::datatype::RecordType::closed(
                    record
                        .iter()
                        .map(|(name, value)| (name.to_string(), value.datatype())),
                ))
            }
            Self::Item(item) => DataType::Item(item.schema().clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Record(_) => "record",
            Self::Item(_) => "item",
        }
    }

    pub fn try_as_bool(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            other => Err(type_mismatch("boolean", other)),
        }
    }

    pub fn try_as_i64(&self) -> Result<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(type_mismatch("int", other)),
        }
    }

    pub fn try_as_f64(&self) -> Result<f64> {
        match self {
            Self::Int(i) => Ok(*i as f64),
            Self::Float(f) => Ok(*f),
            other => Err(type_mismatch("numeric", other)),
        }
    }

    pub fn try_as_str(&self) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(type_mismatch("text", other)),
        }
    }

    pub fn try_as_list(&self) -> Result<&[Value]> {
        match self {
            Self::List(values) => Ok(values),
            other => Err(type_mismatch("list", other)),
        }
    }

    pub fn try_as_item(&self) -> Result<&Item> {
        match self {
            Self::Item(item) => Ok(item),
            other => Err(type_mismatch("item", other)),
        }
    }

    /// Interpret this value as the outcome of a predicate.
    ///
    /// Null is treated as false.
    pub fn try_as_predicate(&self) -> Result<bool> {
        match self {
            Self::Boolean(b) => Ok(*b),
            Self::Null => Ok(false),
            other => Err(type_mismatch("boolean", other)),
        }
    }

    /// Get a field from a mapping value.
    pub fn try_get_field(&self, name: &str) -> Result<Value> {
        match self {
            Self::Item(item) => item.get(name),
            Self::Record(record) => record.get(name).cloned().ok_or_else(|| {
                DbError::with_kind(
                    ErrorKind::UnknownField,
                    format!("Record has no field '{name}'"),
                )
            }),
            other => Err(DbError::with_kind(
                ErrorKind::TypeMismatch,
                format!("Cannot access field '{name}' on a {} value", other.type_name()),
            )),
        }
    }

    /// Get all (resolved) fields of a mapping value.
    pub fn try_mapping_entries(&self) -> Result<Vec<(String, Value)>> {
        match self {
            Self::Item(item) => item.values(),
            Self::Record(record) => Ok(record
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect()),
            other => Err(type_mismatch("mapping", other)),
        }
    }

    /// Compare two values for ordering.
    ///
    /// Null orders before everything else. Numeric values compare across
    /// int and float. Errors for values without an order between them.
    pub fn try_cmp(&self, other: &Value) -> Result<Ordering> {
        Ok(match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Int(a), Self::Float(b)) => cmp_f64(*a as f64, *b),
            (Self::Float(a), Self::Int(b)) => cmp_f64(*a, *b as f64),
            (Self::Float(a), Self::Float(b)) => cmp_f64(*a, *b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::List(a), Self::List(b)) => {
                for (a, b) in a.iter().zip(b.iter()) {
                    match a.try_cmp(b)? {
                        Ordering::Equal => continue,
                        ord => return Ok(ord),
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) => {
                return Err(DbError::with_kind(
                    ErrorKind::TypeMismatch,
                    format!(
                        "Cannot order a {} value against a {} value",
                        a.type_name(),
                        b.type_name()
                    ),
                ));
            }
        })
    }
}

/// Total order on floats shared by ordering and equality. Zeros compare
/// equal regardless of sign, NaN equals itself and sorts after every number.
pub(crate) fn cmp_f64(a: f64, b: f64) -> Ordering {
    canonical_f64(a).total_cmp(&canonical_f64(b))
}

pub(crate) fn canonical_f64(f: f64) -> f64 {
    if f == 0.0 {
        0.0
    } else if f.is_nan() {
        f64::NAN
    } else {
        f
    }
}

pub(crate) fn type_mismatch(expected: &str, got: &Value) -> DbError {
    DbError::with_kind(
        ErrorKind::TypeMismatch,
        format!("Expected {expected} value, got {}", got.type_name()),
    )
    .with_field("value", got)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => {
                cmp_f64(*a as f64, *b) == Ordering::Equal
            }
            (Self::Float(a), Self::Float(b)) => cmp_f64(*a, *b) == Ordering::Equal,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Record(a), Self::Record(b)) => a == b,
            (Self::Item(a), Self::Item(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => {
                write!(f, "\\x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Timestamp(ts) => write!(f, "{ts}"),
            Self::List(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "]")
            }
            Self::Record(record) => write!(f, "{record}"),
            Self::Item(item) => write!(f, "{item}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Record> for Value {
    fn from(value: Record) -> Self {
        Value::Record(value)
    }
}

impl From<Item> for Value {
    fn from(value: Item) -> Self {
        Value::Item(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_equality_across_types() {
        assert_eq!(Value::Int(2), Value::Float(2.0));
        assert_ne!(Value::Int(2), Value::Float(2.5));
        assert_ne!(Value::Int(1), Value::from("1"));
    }

    #[test]
    fn float_equality_agrees_with_ordering() {
        let zero = Value::Float(0.0);
        let neg_zero = Value::Float(-0.0);
        assert_eq!(zero, neg_zero);
        assert_eq!(Ordering::Equal, neg_zero.try_cmp(&zero).unwrap());
        assert_eq!(Ordering::Equal, Value::Int(0).try_cmp(&neg_zero).unwrap());

        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, Value::Float(-f64::NAN));
        assert_eq!(Ordering::Equal, nan.try_cmp(&Value::Float(f64::NAN)).unwrap());
        assert_eq!(Ordering::Greater, nan.try_cmp(&Value::Float(f64::INFINITY)).unwrap());
    }

    #[test]
    fn null_orders_first() {
        assert_eq!(Ordering::Less, Value::Null.try_cmp(&Value::Int(-10)).unwrap());
        assert_eq!(Ordering::Greater, Value::from("a").try_cmp(&Value::Null).unwrap());
        assert_eq!(Ordering::Equal, Value::Null.try_cmp(&Value::Null).unwrap());
    }

    #[test]
    fn cmp_mixed_numeric() {
        assert_eq!(Ordering::Less, Value::Int(1).try_cmp(&Value::Float(1.5)).unwrap());
        assert_eq!(Ordering::Greater, Value::Float(3.0).try_cmp(&Value::Int(2)).unwrap());
    }

    #[test]
    fn cmp_lists_lexicographic() {
        let a = Value::List(vec![Value::Int(1), Value::from("b")]);
        let b = Value::List(vec![Value::Int(1), Value::from("c")]);
        let c = Value::List(vec![Value::Int(1)]);
        assert_eq!(Ordering::Less, a.try_cmp(&b).unwrap());
        assert_eq!(Ordering::Greater, a.try_cmp(&c).unwrap());
    }

    #[test]
    fn cmp_unorderable_errors() {
        let err = Value::from("a").try_cmp(&Value::Int(1)).unwrap_err();
        assert!(err.is_kind(ErrorKind::TypeMismatch));

        let record = Value::Record(Record::from_iter([("a", 1)]));
        let err = record.try_cmp(&record).unwrap_err();
        assert!(err.is_kind(ErrorKind::TypeMismatch));
    }

    #[test]
    fn predicate_truthiness() {
        assert!(Value::Boolean(true).try_as_predicate().unwrap());
        assert!(!Value::Null.try_as_predicate().unwrap());
        assert!(Value::Int(1).try_as_predicate().is_err());
    }

    #[test]
    fn record_field_access() {
        let record = Value::Record(Record::from_iter([("foo", "bar")]));
        assert_eq!(Value::from("bar"), record.try_get_field("foo").unwrap());

        let err = record.try_get_field("baz").unwrap_err();
        assert!(err.is_kind(ErrorKind::UnknownField));

        let err = Value::Int(4).try_get_field("foo").unwrap_err();
        assert!(err.is_kind(ErrorKind::TypeMismatch));
    }

    #[test]
    fn list_datatype_unifies() {
        let list = Value::List(vec![Value::Int(1), Value::Float(2.0), Value::Null]);
        assert_eq!(DataType::list(DataType::Float), list.datatype());
    }
}
