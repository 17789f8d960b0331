//! Conversions between records and rows.
//!
//! The read path ([`marshal_row`]) decodes column values into record fields by
//! destination kind. The write path ([`extract_params`]) collects field values
//! in the bind order of a compiled statement.

use crate::error::{DecodeError, Result, StorageError};
use crate::record::{FieldMut, Record};
use crate::schema::Schema;
use crate::value::Value;

/// Positional parameter bindings for a prepared statement.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Params {
    pub values: Vec<Value>,
}

impl Params {
    /// Create a new Params object
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.values.iter()
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}

impl From<&[Value]> for Params {
    fn from(values: &[Value]) -> Self {
        Self {
            values: values.to_vec(),
        }
    }
}

/// Collects `fields` from `record` in order.
///
/// A field the record does not expose is an error; the bound list is never
/// shortened to fit.
pub fn extract_params<R: Record>(record: &R, fields: &[&str]) -> Result<Params> {
    let mut params = Params::new();
    extract_into(&mut params, record, fields)?;
    Ok(params)
}

pub(crate) fn extract_into<R: Record>(params: &mut Params, record: &R, fields: &[&str]) -> Result<()> {
    params.values.reserve(fields.len());
    for &field in fields {
        let value = record
            .field_value(field)
            .ok_or_else(|| StorageError::UnknownField {
                field: field.to_string(),
            })?;
        params.values.push(value);
    }
    Ok(())
}

/// Builds one record from a result row.
///
/// `columns` and `values` are parallel. Columns the schema does not know are
/// skipped; nulls leave the field at its default.
pub fn marshal_row<R: Record>(schema: &Schema, columns: &[String], values: Vec<Value>) -> Result<R> {
    let mut record = R::default();
    for (column, value) in columns.iter().zip(values) {
        let Some(descriptor) = schema.by_column(column) else {
            continue;
        };
        let slot = record
            .field_mut(descriptor.field)
            .ok_or_else(|| StorageError::UnknownField {
                field: descriptor.field.to_string(),
            })?;
        decode_into(slot, value).map_err(|source| StorageError::Decode {
            column: column.clone(),
            field: descriptor.field.to_string(),
            source,
        })?;
    }
    Ok(record)
}

fn decode_into(slot: FieldMut<'_>, value: Value) -> std::result::Result<(), DecodeError> {
    if value.is_null() {
        return Ok(());
    }
    let expected = slot.kind();
    match slot {
        FieldMut::Integer(field) => *field = integer(value, expected)?,
        FieldMut::Int32(field) => *field = int32(value, expected)?,
        FieldMut::Float(field) => *field = float(value, expected)?,
        FieldMut::Bool(field) => *field = integer(value, expected)? != 0,
        FieldMut::Text(field) => *field = text(value, expected)?,
        FieldMut::Bytes(field) => *field = bytes(value, expected)?,
        FieldMut::OptInteger(field) => *field = Some(integer(value, expected)?),
        FieldMut::OptInt32(field) => *field = Some(int32(value, expected)?),
        FieldMut::OptBool(field) => *field = Some(integer(value, expected)? != 0),
        FieldMut::OptFloat(field) => *field = Some(float(value, expected)?),
        FieldMut::OptText(field) => *field = Some(text(value, expected)?),
        FieldMut::OptBytes(field) => *field = Some(bytes(value, expected)?),
    }
    Ok(())
}

fn mismatch(expected: &'static str, found: &Value) -> DecodeError {
    DecodeError::Mismatch {
        expected,
        found: found.kind(),
    }
}

fn integer(value: Value, expected: &'static str) -> std::result::Result<i64, DecodeError> {
    match value {
        Value::Integer(i) => Ok(i),
        // numeric-as-text
        Value::Text(text) => text.trim().parse().map_err(|_| DecodeError::Number(text)),
        other => Err(mismatch(expected, &other)),
    }
}

fn int32(value: Value, expected: &'static str) -> std::result::Result<i32, DecodeError> {
    let wide = integer(value, expected)?;
    i32::try_from(wide).map_err(|_| DecodeError::OutOfRange(wide))
}

fn float(value: Value, expected: &'static str) -> std::result::Result<f64, DecodeError> {
    match value {
        Value::Real(r) => Ok(r),
        Value::Integer(i) => Ok(i as f64),
        // DECIMAL/NUMERIC columns may come back as text
        Value::Text(text) => parse_decimal(&text),
        Value::Blob(bytes) => parse_decimal(std::str::from_utf8(&bytes).map_err(|_| DecodeError::Utf8)?),
        other => Err(mismatch(expected, &other)),
    }
}

fn parse_decimal(text: &str) -> std::result::Result<f64, DecodeError> {
    text.trim()
        .parse()
        .map_err(|_| DecodeError::Number(text.to_string()))
}

fn text(value: Value, expected: &'static str) -> std::result::Result<String, DecodeError> {
    match value {
        Value::Text(text) => Ok(text),
        Value::Blob(bytes) => String::from_utf8(bytes).map_err(|_| DecodeError::Utf8),
        other => Err(mismatch(expected, &other)),
    }
}

fn bytes(value: Value, expected: &'static str) -> std::result::Result<Vec<u8>, DecodeError> {
    match value {
        Value::Blob(bytes) => Ok(bytes),
        Value::Text(text) => Ok(text.into_bytes()),
        other => Err(mismatch(expected, &other)),
    }
}
