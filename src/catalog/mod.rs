mod fields;
mod models;
mod validation;

pub use fields::{FieldKind, FieldSource, FieldSpec, FieldValue, PathSegment, Row, RowError};
pub use models::{Album, Artist, KeyedTable, Record, Track, TrackFeature};
pub use validation::{
    parse_release_date, resolve_path, validate_record, validate_value, ValidationError,
    ValidationResult,
};
