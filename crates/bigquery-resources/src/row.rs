//! Conversion between the wire row format (`{"f": [{"v": ...}, ...]}`) and JSON objects keyed
//! by column name.
//!
//! On the wire every scalar is a string (or null), regardless of the column type, and the
//! column names only live in the schema. Decoding zips the two back together and restores
//! native JSON types where one exists.
use serde_json::{Map, Number, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::table::{FieldMode, FieldType, TableFieldSchema};

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct TableRow {
    pub f: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Deserialize, serde::Serialize)]
pub struct TableCell {
    pub v: Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("column '{column}': {reason}")]
pub struct DecodeError {
    pub column: String,
    pub reason: String,
}

impl DecodeError {
    fn new(column: &TableFieldSchema, reason: impl Into<String>) -> Self {
        Self {
            column: column.name.clone(),
            reason: reason.into(),
        }
    }
}

/// Decodes a single wire row into an object keyed by column name.
pub fn decode_row(fields: &[TableFieldSchema], row: &TableRow) -> Result<Map<String, Value>, DecodeError> {
    let mut object = Map::with_capacity(fields.len());

    // the API omits trailing cells for nothing, but be lenient with short rows anyways
    for (index, field) in fields.iter().enumerate() {
        let value = match row.f.get(index) {
            Some(cell) => decode_cell(field, &cell.v)?,
            None => Value::Null,
        };

        object.insert(field.name.clone(), value);
    }

    Ok(object)
}

fn decode_cell(field: &TableFieldSchema, value: &Value) -> Result<Value, DecodeError> {
    match (field.mode, value) {
        (_, Value::Null) => Ok(Value::Null),
        (FieldMode::Repeated, Value::Array(elements)) => elements
            .iter()
            .map(|element| match element {
                Value::Object(wrapper) => {
                    decode_scalar(field, wrapper.get("v").unwrap_or(&Value::Null))
                }
                _ => Err(DecodeError::new(field, "expected repeated elements wrapped in {\"v\": ...}")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (FieldMode::Repeated, _) => Err(DecodeError::new(field, "expected an array for a repeated column")),
        _ => decode_scalar(field, value),
    }
}

fn decode_scalar(field: &TableFieldSchema, value: &Value) -> Result<Value, DecodeError> {
    let s = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s.as_str(),
        Value::Object(nested) if field.ty == FieldType::Record => {
            let row: TableRow = serde_json::from_value(Value::Object(nested.clone()))
                .map_err(|error| DecodeError::new(field, error.to_string()))?;
            return decode_row(&field.fields, &row).map(Value::Object);
        }
        // already a native value, nothing to restore
        other => return Ok(other.clone()),
    };

    match field.ty {
        FieldType::Integer => s
            .parse::<i64>()
            .map(Value::from)
            .map_err(|error| DecodeError::new(field, format!("invalid integer '{s}': {error}"))),
        FieldType::Float => {
            let float: f64 = s
                .parse()
                .map_err(|error| DecodeError::new(field, format!("invalid float '{s}': {error}")))?;

            // NaN and infinities have no JSON representation, keep them as strings
            Ok(Number::from_f64(float).map_or_else(|| Value::String(s.to_owned()), Value::Number))
        }
        FieldType::Bool => match s {
            "true" | "TRUE" => Ok(Value::Bool(true)),
            "false" | "FALSE" => Ok(Value::Bool(false)),
            _ => Err(DecodeError::new(field, format!("invalid boolean '{s}'"))),
        },
        FieldType::Timestamp => decode_timestamp(s)
            .map(Value::String)
            .ok_or_else(|| DecodeError::new(field, format!("invalid timestamp '{s}'"))),
        FieldType::Record => Err(DecodeError::new(field, "expected an object for a record column")),
        _ => Ok(Value::String(s.to_owned())),
    }
}

/// Timestamps come back as (possibly exponent formatted) floating point seconds since the
/// unix epoch, i.e `"1.7504181E9"`. They're turned into RFC 3339 strings with microsecond
/// precision, which is what BigQuery stores.
fn decode_timestamp(s: &str) -> Option<String> {
    let seconds: f64 = s.parse().ok()?;
    let micros = (seconds * 1_000_000.0).round() as i128;
    let ts = OffsetDateTime::from_unix_timestamp_nanos(micros * 1_000).ok()?;
    ts.format(&Rfc3339).ok()
}

/// Encodes an object into the wire row format, the inverse of [`decode_row`].
///
/// Columns missing from the object are encoded as null.
pub fn encode_row(fields: &[TableFieldSchema], object: &Map<String, Value>) -> TableRow {
    let f = fields
        .iter()
        .map(|field| TableCell {
            v: encode_cell(field, object.get(&field.name).unwrap_or(&Value::Null)),
        })
        .collect();

    TableRow { f }
}

fn encode_cell(field: &TableFieldSchema, value: &Value) -> Value {
    match (field.mode, value) {
        (FieldMode::Repeated, Value::Array(elements)) => Value::Array(
            elements
                .iter()
                .map(|element| serde_json::json!({ "v": encode_scalar(field, element) }))
                .collect(),
        ),
        _ => encode_scalar(field, value),
    }
}

fn encode_scalar(field: &TableFieldSchema, value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Object(nested) if field.ty == FieldType::Record => {
            serde_json::to_value(encode_row(&field.fields, nested)).unwrap_or(Value::Null)
        }
        Value::String(s) if field.ty == FieldType::Timestamp => match OffsetDateTime::parse(s, &Rfc3339) {
            Ok(ts) => {
                let micros = ts.unix_timestamp_nanos() / 1_000;
                Value::String(format!("{:E}", micros as f64 / 1_000_000.0))
            }
            Err(_) => Value::String(s.clone()),
        },
        Value::String(s) => Value::String(s.clone()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        other => Value::String(other.to_string()),
    }
}
