//! Field validation for raw upstream records.
//!
//! Every non-key field degrades to null when the upstream value has the wrong
//! shape or type. Key fields (the primary key, and the parent key injected by
//! the extractor) are required: a record without them cannot be stored and
//! aborts the extraction.

use super::fields::{FieldKind, FieldSource, FieldValue, PathSegment, Row, RowError};
use super::models::Record;
use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{entity} record does not have a valid '{field}' identifier")]
    MissingKey {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{entity} record could not be assembled: {source}")]
    Row {
        entity: &'static str,
        #[source]
        source: RowError,
    },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Follow `path` into `raw`. Any missing step resolves to `None`.
pub fn resolve_path<'a>(raw: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = raw;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.as_object()?.get(*key)?,
            PathSegment::First => match current {
                Value::Array(items) => items.first()?,
                other => other,
            },
        };
    }
    Some(current)
}

/// Validate a single raw value against the expected kind.
pub fn validate_value(value: Option<&Value>, kind: FieldKind) -> FieldValue {
    let Some(value) = value else {
        return FieldValue::Null;
    };
    match (kind, value) {
        (FieldKind::Text, Value::String(s)) if !s.is_empty() => FieldValue::Text(s.clone()),
        (FieldKind::Integer, Value::Number(n)) if !n.is_f64() => {
            n.as_i64().map(FieldValue::Integer).unwrap_or(FieldValue::Null)
        }
        (FieldKind::Boolean, Value::Bool(b)) => FieldValue::Boolean(*b),
        (FieldKind::Float, Value::Number(n)) if n.is_f64() => {
            n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null)
        }
        (FieldKind::Date, Value::String(s)) => parse_release_date(s)
            .map(FieldValue::Date)
            .unwrap_or(FieldValue::Null),
        _ => FieldValue::Null,
    }
}

/// Parse a release date whose precision is given by its length.
///
/// `YYYY` maps to January 1st, `YYYY-MM` to the first of the month and
/// `YYYY-MM-DD` is taken as is. Any other length, or a string of a known
/// length that doesn't match its pattern, yields `None`.
pub fn parse_release_date(s: &str) -> Option<NaiveDate> {
    let full = match s.len() {
        4 if has_date_shape(s) => format!("{}-01-01", s),
        7 if has_date_shape(s) => format!("{}-01", s),
        10 if has_date_shape(s) => s.to_string(),
        _ => return None,
    };
    NaiveDate::parse_from_str(&full, "%Y-%m-%d").ok()
}

fn has_date_shape(s: &str) -> bool {
    s.bytes().enumerate().all(|(i, b)| match i {
        4 | 7 => b == b'-',
        _ => b.is_ascii_digit(),
    })
}

/// Validate a raw record into a typed record.
///
/// `parent` is the key of the upstream entity the record was fetched for; it
/// fills the record's `Parent` column when the entity has one.
pub fn validate_record<T: Record>(raw: &Value, parent: Option<&str>) -> ValidationResult<T> {
    let mut values = Vec::with_capacity(T::FIELDS.len());
    for spec in T::FIELDS {
        let value = match spec.source {
            FieldSource::Path(path) => validate_value(resolve_path(raw, path), spec.kind),
            FieldSource::Parent => parent
                .filter(|p| !p.is_empty())
                .map(|p| FieldValue::Text(p.to_string()))
                .unwrap_or(FieldValue::Null),
            FieldSource::Constant(tag) => FieldValue::Text(tag.to_string()),
        };
        if spec.required && value.is_null() {
            return Err(ValidationError::MissingKey {
                entity: T::ENTITY,
                field: spec.column,
            });
        }
        values.push(value);
    }

    Row::new(T::FIELDS, values)
        .and_then(T::from_row)
        .map_err(|source| ValidationError::Row {
            entity: T::ENTITY,
            source,
        })
}
