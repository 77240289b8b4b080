//! Conversion between values and JSON documents.

use chrono::NaiveDateTime;
use dataweave_core::item::Row;
use dataweave_core::schema::Schema;
use dataweave_core::values::{DataType, Record, Value};
use dataweave_error::{DbError, ErrorKind, Result, ResultExt};
use serde_json::{Map, Number, Value as Json};

pub type Document = Json;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Convert a value to JSON.
///
/// Timestamps are stored as ISO 8601 strings and bytes as arrays of numbers.
/// Items can't be stored.
pub fn to_json(value: &Value) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(*b),
        Value::Int(i) => Json::Number((*i).into()),
        Value::Float(f) => Json::Number(Number::from_f64(*f).ok_or_else(|| {
            DbError::with_kind(
                ErrorKind::DataSource,
                format!("Cannot store non-finite float {f}"),
            )
        })?),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(b) => Json::Array(b.iter().map(|b| Json::Number((*b).into())).collect()),
        Value::Timestamp(ts) => Json::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::List(values) => Json::Array(values.iter().map(to_json).collect::<Result<_>>()?),
        Value::Record(record) => {
            let mut map = Map::with_capacity(record.len());
            for (name, value) in record.iter() {
                map.insert(name.to_string(), to_json(value)?);
            }
            Json::Object(map)
        }
        Value::Item(_) => {
            return Err(DbError::with_kind(
                ErrorKind::DataSource,
                "Cannot store an item inside a document",
            ));
        }
    })
}

/// Convert JSON to a value without type information.
///
/// Integral numbers become ints, objects become records.
pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(values) => Value::List(values.iter().map(from_json).collect()),
        Json::Object(map) => Value::Record(
            map.iter()
                .map(|(name, value)| (name.as_str(), from_json(value)))
                .collect::<Record>(),
        ),
    }
}

/// Convert JSON to a value of the given type.
pub fn from_json_typed(json: &Json, datatype: &DataType) -> Result<Value> {
    Ok(match (datatype, json) {
        (_, Json::Null) => Value::Null,
        (DataType::Float, Json::Number(n)) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        (DataType::Timestamp, Json::String(s)) => Value::Timestamp(
            NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
                .context_fn(|| format!("Failed to parse stored timestamp '{s}'"))?,
        ),
        (DataType::Bytes, Json::Array(values)) => Value::Bytes(
            values
                .iter()
                .map(|v| {
                    v.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| DbError::new("Stored bytes contain a non-byte value"))
                })
                .collect::<Result<_>>()?,
        ),
        (DataType::Timestamp | DataType::Bytes, other) => {
            return Err(DbError::new(format!(
                "Stored value {other} doesn't match property type {datatype}"
            )));
        }
        (_, other) => from_json(other),
    })
}

/// Build a document from a row, coercing values to the property types.
pub fn document_from_row(row: &Row, schema: &Schema) -> Result<Document> {
    let mut doc = Map::with_capacity(schema.len());
    for prop in schema.properties() {
        let value = row.get(&prop.name).unwrap_or(&Value::Null);
        prop.validate(value)?;
        let value = match (&prop.datatype, value) {
            // Keeps floats stored as floats even when set from an int.
            (DataType::Float, Value::Int(i)) => Value::Float(*i as f64),
            _ => value.clone(),
        };
        doc.insert(prop.name.clone(), to_json(&value)?);
    }
    Ok(Json::Object(doc))
}

/// Read a stored document back into a row.
pub fn row_from_document(doc: &Document, schema: &Schema) -> Result<Row> {
    let Json::Object(map) = doc else {
        return Err(DbError::new("Stored document is not an object"));
    };
    schema
        .properties()
        .map(|prop| {
            let value = match map.get(&prop.name) {
                Some(json) => from_json_typed(json, &prop.datatype)?,
                None => Value::Null,
            };
            Ok((prop.name.clone(), value))
        })
        .collect()
}

/// If values of this type convert to JSON and back unchanged.
pub fn is_plain_type(datatype: &DataType) -> bool {
    matches!(
        datatype,
        DataType::Boolean | DataType::Int | DataType::Float | DataType::Text
    )
}
