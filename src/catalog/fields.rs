//! Field-spec tables shared by extraction, snapshots and the sink.
//!
//! Every entity declares an ordered list of [`FieldSpec`]s. The same list is
//! used to validate raw upstream records, to lay out snapshot columns and to
//! order sink columns, so the three can never drift apart.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[macro_export]
macro_rules! field_spec {
    ($column:expr, $kind:expr, $source:expr $(, $field:ident = $value:expr)*) => {
        {
            // Only mutated when optional field assignments are passed (e.g. `required = true`)
            #[allow(unused_mut)]
            let mut spec = FieldSpec {
                column: $column,
                kind: $kind,
                source: $source,
                required: false,
            };
            $(
                spec.$field = $value;
            )*
            spec
        }
    };
}

/// Expected shape of a validated field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Boolean,
    Float,
    /// A precision-aware release date normalized to day precision.
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Float => "float",
            FieldKind::Date => "date",
        }
    }
}

/// One step into a nested upstream record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Look up a key in an object.
    Key(&'static str),
    /// Take the first element of a list; a non-list value passes through as is.
    First,
}

/// Where a column's value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldSource {
    /// A (possibly nested) path into the raw record.
    Path(&'static [PathSegment]),
    /// The parent key the extraction call was made for.
    Parent,
    /// A fixed tag written on every record.
    Constant(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub column: &'static str,
    pub kind: FieldKind,
    pub source: FieldSource,
    /// Required fields abort the extraction when invalid instead of degrading to null.
    pub required: bool,
}

/// A validated, typed cell value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Date(NaiveDate),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Whether this value may be stored in a column of `kind`.
    pub fn fits(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldValue::Null, _)
                | (FieldValue::Text(_), FieldKind::Text)
                | (FieldValue::Integer(_), FieldKind::Integer)
                | (FieldValue::Boolean(_), FieldKind::Boolean)
                | (FieldValue::Float(_), FieldKind::Float)
                | (FieldValue::Date(_), FieldKind::Date)
        )
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map(FieldValue::Text).unwrap_or(FieldValue::Null)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map(FieldValue::Integer).unwrap_or(FieldValue::Null)
    }
}

impl From<Option<bool>> for FieldValue {
    fn from(value: Option<bool>) -> Self {
        value.map(FieldValue::Boolean).unwrap_or(FieldValue::Null)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map(FieldValue::Float).unwrap_or(FieldValue::Null)
    }
}

impl From<Option<NaiveDate>> for FieldValue {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(FieldValue::Date).unwrap_or(FieldValue::Null)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("Row has {actual} values, expected {expected}")]
    Arity { expected: usize, actual: usize },

    #[error("Column '{column}' holds a value that is not {expected}")]
    WrongKind {
        column: &'static str,
        expected: &'static str,
    },

    #[error("Column '{column}' is required but was null")]
    NullKey { column: &'static str },
}

/// A row of validated values, positionally aligned with a field-spec table.
#[derive(Debug)]
pub struct Row {
    specs: &'static [FieldSpec],
    values: Vec<FieldValue>,
}

impl Row {
    pub fn new(specs: &'static [FieldSpec], values: Vec<FieldValue>) -> Result<Self, RowError> {
        if specs.len() != values.len() {
            return Err(RowError::Arity {
                expected: specs.len(),
                actual: values.len(),
            });
        }
        for (spec, value) in specs.iter().zip(&values) {
            if !value.fits(spec.kind) {
                return Err(RowError::WrongKind {
                    column: spec.column,
                    expected: spec.kind.as_str(),
                });
            }
        }
        Ok(Self { specs, values })
    }

    fn take(&mut self, column: &'static str) -> FieldValue {
        self.specs
            .iter()
            .position(|s| s.column == column)
            .map(|i| std::mem::replace(&mut self.values[i], FieldValue::Null))
            .unwrap_or(FieldValue::Null)
    }

    pub fn take_key(&mut self, column: &'static str) -> Result<String, RowError> {
        match self.take(column) {
            FieldValue::Text(s) => Ok(s),
            _ => Err(RowError::NullKey { column }),
        }
    }

    pub fn take_text(&mut self, column: &'static str) -> Option<String> {
        match self.take(column) {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn take_integer(&mut self, column: &'static str) -> Option<i64> {
        match self.take(column) {
            FieldValue::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn take_boolean(&mut self, column: &'static str) -> Option<bool> {
        match self.take(column) {
            FieldValue::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn take_float(&mut self, column: &'static str) -> Option<f64> {
        match self.take(column) {
            FieldValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn take_date(&mut self, column: &'static str) -> Option<NaiveDate> {
        match self.take(column) {
            FieldValue::Date(d) => Some(d),
            _ => None,
        }
    }
}
