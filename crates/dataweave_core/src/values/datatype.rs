use std::fmt;

use dataweave_error::{DbError, ErrorKind, Result};

use crate::schema::SchemaRef;

/// Coarse shape of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    /// Shape not known until evaluation.
    Any,
    Scalar,
    Sequence,
    Mapping,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Scalar => write!(f, "scalar"),
            Self::Sequence => write!(f, "sequence"),
            Self::Mapping => write!(f, "mapping"),
        }
    }
}

/// Fields of a mapping type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordType {
    pub fields: Vec<(String, DataType)>,
    /// If the mapping may contain fields not listed.
    pub open: bool,
}

impl RecordType {
    pub fn closed(fields: impl IntoIterator<Item = (String, DataType)>) -> Self {
        RecordType {
            fields: fields.into_iter().collect(),
            open: false,
        }
    }

    pub fn open() -> Self {
        RecordType {
            fields: Vec::new(),
            open: true,
        }
    }

    pub fn field(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Insert or replace a field, keeping the position of a replaced field.
    pub fn set_field(&mut self, name: impl Into<String>, datatype: DataType) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = datatype,
            None => self.fields.push((name, datatype)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    /// Type only known at evaluation time.
    ///
    /// Compatible with every other type during type checking.
    Any,
    Null,
    Boolean,
    Int,
    Float,
    Text,
    Bytes,
    Timestamp,
    List(Box<DataType>),
    Record(RecordType),
    /// An item belonging to a source with the given schema.
    Item(SchemaRef),
}

impl DataType {
    pub fn list(element: DataType) -> Self {
        DataType::List(Box::new(element))
    }

    pub fn type_class(&self) -> TypeClass {
        match self {
            Self::Any => TypeClass::Any,
            Self::List(_) => TypeClass::Sequence,
            Self::Record(_) | Self::Item(_) => TypeClass::Mapping,
            _ => TypeClass::Scalar,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// If a value of this type can be used where a boolean is expected.
    pub fn is_boolean_like(&self) -> bool {
        matches!(self, Self::Any | Self::Null | Self::Boolean)
    }

    /// If values of this type have a total order between themselves.
    pub fn is_orderable(&self) -> bool {
        match self {
            Self::Any
            | Self::Null
            | Self::Boolean
            | Self::Int
            | Self::Float
            | Self::Text
            | Self::Bytes
            | Self::Timestamp => true,
            Self::List(elem) => elem.is_orderable(),
            Self::Record(_) | Self::Item(_) => false,
        }
    }

    /// Check if values of both types can be compared with `<`, `>`, etc.
    pub fn is_order_comparable_with(&self, other: &DataType) -> bool {
        if !self.is_orderable() || !other.is_orderable() {
            return false;
        }
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) | (Self::Null, _) | (_, Self::Null) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (Self::List(a), Self::List(b)) => a.is_order_comparable_with(b),
            (a, b) => a == b,
        }
    }

    /// Get the type of the elements if this is a sequence type.
    pub fn element_type(&self) -> Result<DataType> {
        match self {
            Self::Any => Ok(DataType::Any),
            Self::List(elem) => Ok(elem.as_ref().clone()),
            other => Err(DbError::with_kind(
                ErrorKind::InvalidExpression,
                format!("Expected a sequence, got {other}"),
            )),
        }
    }

    /// Get the type of a field if this is a mapping type.
    pub fn field_type(&self, name: &str) -> Result<DataType> {
        match self {
            Self::Any => Ok(DataType::Any),
            Self::Item(schema) => match schema.property(name) {
                Some(prop) => Ok(prop.datatype.clone()),
                None => Err(DbError::with_kind(
                    ErrorKind::InvalidExpression,
                    format!("Items have no property '{name}'"),
                )
                .with_field("properties", schema.field_names().collect::<Vec<_>>().join(", "))),
            },
            Self::Record(record) => match record.field(name) {
                Some(datatype) => Ok(datatype.clone()),
                None if record.open => Ok(DataType::Any),
                None => Err(DbError::with_kind(
                    ErrorKind::InvalidExpression,
                    format!("Record has no field '{name}'"),
                )),
            },
            other => Err(DbError::with_kind(
                ErrorKind::InvalidExpression,
                format!("Cannot access field '{name}' on {other}"),
            )),
        }
    }

    /// Fields known for a mapping type.
    ///
    /// Returns None if this isn't a mapping type.
    pub fn mapping_fields(&self) -> Option<RecordType> {
        match self {
            Self::Any => Some(RecordType::open()),
            Self::Item(schema) => Some(RecordType::closed(
                schema
                    .properties()
                    .map(|prop| (prop.name.clone(), prop.datatype.clone())),
            )),
            Self::Record(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// Find a type both inputs fit in.
    pub fn unify(&self, other: &DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a.clone(),
            (Self::Null, b) => b.clone(),
            (a, Self::Null) => a.clone(),
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            (Self::List(a), Self::List(b)) => Self::list(a.unify(b)),
            _ => Self::Any,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "Any"),
            Self::Null => write!(f, "Null"),
            Self::Boolean => write!(f, "Boolean"),
            Self::Int => write!(f, "Int"),
            Self::Float => write!(f, "Float"),
            Self::Text => write!(f, "Text"),
            Self::Bytes => write!(f, "Bytes"),
            Self::Timestamp => write!(f, "Timestamp"),
            Self::List(elem) => write!(f, "List<{elem}>"),
            Self::Record(record) => {
                write!(f, "Record{{")?;
                for (idx, (name, datatype)) in record.fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {datatype}")?;
                }
                if record.open {
                    if !record.fields.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "..")?;
                }
                write!(f, "}}")
            }
            Self::Item(schema) => write!(f, "Item<{}>", schema.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_classes() {
        assert_eq!(TypeClass::Scalar, DataType::Int.type_class());
        assert_eq!(TypeClass::Sequence, DataType::list(DataType::Int).type_class());
        assert_eq!(TypeClass::Mapping, DataType::Record(RecordType::open()).type_class());
        assert_eq!(TypeClass::Any, DataType::Any.type_class());
    }

    #[test]
    fn order_comparable() {
        assert!(DataType::Int.is_order_comparable_with(&DataType::Float));
        assert!(DataType::Text.is_order_comparable_with(&DataType::Any));
        assert!(DataType::Null.is_order_comparable_with(&DataType::Text));
        assert!(!DataType::Text.is_order_comparable_with(&DataType::Int));
        assert!(!DataType::Record(RecordType::open()).is_order_comparable_with(&DataType::Any));
    }

    #[test]
    fn closed_record_missing_field() {
        let record = DataType::Record(RecordType::closed([("foo".to_string(), DataType::Text)]));
        assert_eq!(DataType::Text, record.field_type("foo").unwrap());

        let err = record.field_type("bar").unwrap_err();
        assert!(err.is_kind(ErrorKind::InvalidExpression));
    }

    #[test]
    fn open_record_unknown_field() {
        let record = DataType::Record(RecordType::open());
        assert_eq!(DataType::Any, record.field_type("anything").unwrap());
    }

    #[test]
    fn unify_numeric() {
        assert_eq!(DataType::Float, DataType::Int.unify(&DataType::Float));
        assert_eq!(DataType::Text, DataType::Null.unify(&DataType::Text));
        assert_eq!(DataType::Any, DataType::Text.unify(&DataType::Int));
    }

    #[test]
    fn display_record() {
        let mut record = RecordType::closed([("a".to_string(), DataType::Int)]);
        record.set_field("b", DataType::Text);
        record.set_field("a", DataType::Float);
        assert_eq!("Record{a: Float, b: Text}", DataType::Record(record).to_string());
    }
}
