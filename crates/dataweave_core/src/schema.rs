use std::sync::Arc;

use dataweave_error::{DbError, ErrorKind, Result};
use indexmap::IndexMap;

use crate::values::{DataType, TypeClass, Value};

pub type SchemaRef = Arc<Schema>;

/// A single named, typed field of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub datatype: DataType,
    /// If this property is part of the identity key.
    pub identity: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Property {
            name: name.into(),
            datatype,
            identity: false,
        }
    }

    pub fn identity(name: impl Into<String>, datatype: DataType) -> Self {
        Property {
            name: name.into(),
            datatype,
            identity: true,
        }
    }

    /// Check that a value can be stored in this property.
    ///
    /// Null is always accepted, it's the value of absent fields.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if value_fits(&self.datatype, value) {
            return Ok(());
        }
        Err(DbError::with_kind(
            ErrorKind::TypeMismatch,
            format!(
                "Value of type {} cannot be stored in property '{}'",
                value.type_name(),
                self.name
            ),
        )
        .with_field("expected", &self.datatype))
    }
}

fn value_fits(datatype: &DataType, value: &Value) -> bool {
    match (datatype, value) {
        (_, Value::Null) | (DataType::Any, _) => true,
        (DataType::Boolean, Value::Boolean(_)) => true,
        (DataType::Int, Value::Int(_)) => true,
        (DataType::Float, Value::Int(_) | Value::Float(_)) => true,
        (DataType::Text, Value::Text(_)) => true,
        (DataType::Bytes, Value::Bytes(_)) => true,
        (DataType::Timestamp, Value::Timestamp(_)) => true,
        _ => false,
    }
}

/// Field declarations of one data source.
///
/// Immutable once built, shared through a `SchemaRef`.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    properties: IndexMap<String, Property>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            properties: IndexMap::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn properties(&self) -> impl ExactSizeIterator<Item = &Property> {
        self.properties.values()
    }

    pub fn field_names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.properties.keys().map(|k| k.as_str())
    }

    pub fn identity_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values().filter(|p| p.identity)
    }

    pub fn has_identity(&self) -> bool {
        self.properties.values().any(|p| p.identity)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    properties: IndexMap<String, Property>,
    /// First error encountered while adding properties, returned on build.
    error: Option<DbError>,
}

impl SchemaBuilder {
    pub fn with_property(mut self, property: Property) -> Self {
        if self.error.is_some() {
            return self;
        }

        if self.properties.contains_key(&property.name) {
            self.error = Some(
                DbError::with_kind(ErrorKind::SchemaMismatch, "Duplicate property name")
                    .with_field("property", &property.name)
                    .with_field("schema", &self.name),
            );
            return self;
        }

        match property.datatype.type_class() {
            TypeClass::Scalar | TypeClass::Any => (),
            class => {
                self.error = Some(
                    DbError::with_kind(
                        ErrorKind::SchemaMismatch,
                        format!("Properties must be scalar, got a {class} type"),
                    )
                    .with_field("property", &property.name),
                );
                return self;
            }
        }

        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn with_field(self, name: impl Into<String>, datatype: DataType) -> Self {
        self.with_property(Property::new(name, datatype))
    }

    pub fn with_identity(self, name: impl Into<String>, datatype: DataType) -> Self {
        self.with_property(Property::identity(name, datatype))
    }

    pub fn build(self) -> Result<SchemaRef> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Arc::new(Schema {
            name: self.name,
            properties: self.properties,
        }))
    }
}
