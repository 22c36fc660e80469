//! Column-oriented table snapshots.
//!
//! A snapshot is a zip archive holding a `manifest.json` (table name, row
//! count and ordered column list) and one `columns/<column>.json` entry per
//! column, each a JSON array with one value per row. Files are written to a
//! temporary file first and renamed into place, so an interrupted write never
//! leaves a truncated snapshot behind.

use crate::catalog::{FieldKind, FieldValue, KeyedTable, Record, Row, RowError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const SNAPSHOT_EXTENSION: &str = "snapshot";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Archive error in {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Encoding error in {path:?}: {source}")]
    Encoding {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot {path:?} does not match the {entity} layout: {reason}")]
    Schema {
        path: PathBuf,
        entity: &'static str,
        reason: String,
    },

    #[error("Snapshot {path:?} holds an invalid {entity} row: {source}")]
    Row {
        path: PathBuf,
        entity: &'static str,
        #[source]
        source: RowError,
    },
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Which pipeline stage a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    Raw,
    Cleaned,
}

impl SnapshotKind {
    fn dir_name(&self) -> &'static str {
        match self {
            SnapshotKind::Raw => "raw_data",
            SnapshotKind::Cleaned => "cleaned_data",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct ColumnManifest {
    name: String,
    kind: FieldKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Manifest {
    table: String,
    entity: String,
    row_count: usize,
    columns: Vec<ColumnManifest>,
}

/// Snapshot directories of one data directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn dir(&self, kind: SnapshotKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn path(&self, kind: SnapshotKind, table: &str) -> PathBuf {
        self.dir(kind)
            .join(format!("{}.{}", table, SNAPSHOT_EXTENSION))
    }

    pub fn exists(&self, kind: SnapshotKind, table: &str) -> bool {
        self.path(kind, table).is_file()
    }

    /// Names of the snapshots present for `kind`, sorted.
    #[cfg(test)]
    pub fn list(&self, kind: SnapshotKind) -> SnapshotResult<Vec<String>> {
        let dir = self.dir(kind);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| SnapshotError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SnapshotError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn write<T: Record>(
        &self,
        kind: SnapshotKind,
        table: &str,
        records: &KeyedTable<T>,
    ) -> SnapshotResult<PathBuf> {
        let dir = self.dir(kind);
        fs::create_dir_all(&dir).map_err(|source| SnapshotError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = self.path(kind, table);

        let manifest = Manifest {
            table: table.to_string(),
            entity: T::ENTITY.to_string(),
            row_count: records.len(),
            columns: T::FIELDS
                .iter()
                .map(|f| ColumnManifest {
                    name: f.column.to_string(),
                    kind: f.kind,
                })
                .collect(),
        };

        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(records.len()); T::FIELDS.len()];
        for record in records.values() {
            for (column, value) in columns.iter_mut().zip(record.to_values()) {
                column.push(encode_value(value));
            }
        }

        let temp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| SnapshotError::Io {
            path: dir.clone(),
            source,
        })?;
        {
            let mut zip = ZipWriter::new(BufWriter::new(temp.as_file()));
            let options = SimpleFileOptions::default();

            write_json_entry(&mut zip, &path, MANIFEST_ENTRY, &manifest, options)?;
            for (spec, column) in T::FIELDS.iter().zip(&columns) {
                let entry = format!("columns/{}.json", spec.column);
                write_json_entry(&mut zip, &path, &entry, column, options)?;
            }

            let mut writer = zip.finish().map_err(|source| SnapshotError::Archive {
                path: path.clone(),
                source,
            })?;
            writer.flush().map_err(|source| SnapshotError::Io {
                path: path.clone(),
                source,
            })?;
        }
        temp.persist(&path).map_err(|e| SnapshotError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!("Wrote {} rows to {:?}", records.len(), path);
        Ok(path)
    }

    pub fn read<T: Record>(&self, kind: SnapshotKind, table: &str) -> SnapshotResult<KeyedTable<T>> {
        let path = self.path(kind, table);
        let file = File::open(&path).map_err(|source| SnapshotError::Io {
            path: path.clone(),
            source,
        })?;
        let mut archive =
            ZipArchive::new(BufReader::new(file)).map_err(|source| SnapshotError::Archive {
                path: path.clone(),
                source,
            })?;

        let manifest: Manifest = read_json_entry(&mut archive, &path, MANIFEST_ENTRY)?;
        let schema_error = |reason: String| SnapshotError::Schema {
            path: path.clone(),
            entity: T::ENTITY,
            reason,
        };

        if manifest.entity != T::ENTITY {
            return Err(schema_error(format!(
                "snapshot holds {} records",
                manifest.entity
            )));
        }

        let stored: HashMap<&str, FieldKind> = manifest
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();
        if stored.len() != T::FIELDS.len() {
            return Err(schema_error(format!(
                "{} columns stored, {} expected",
                stored.len(),
                T::FIELDS.len()
            )));
        }

        let mut columns = Vec::with_capacity(T::FIELDS.len());
        for spec in T::FIELDS {
            match stored.get(spec.column) {
                Some(kind) if *kind == spec.kind => {}
                Some(kind) => {
                    return Err(schema_error(format!(
                        "column '{}' is {}, expected {}",
                        spec.column,
                        kind.as_str(),
                        spec.kind.as_str()
                    )))
                }
                None => return Err(schema_error(format!("missing column '{}'", spec.column))),
            }

            let entry = format!("columns/{}.json", spec.column);
            let raw: Vec<Value> = read_json_entry(&mut archive, &path, &entry)?;
            if raw.len() != manifest.row_count {
                return Err(schema_error(format!(
                    "column '{}' has {} values, manifest says {}",
                    spec.column,
                    raw.len(),
                    manifest.row_count
                )));
            }
            let decoded = raw
                .iter()
                .map(|v| {
                    decode_value(v, spec.kind).ok_or_else(|| {
                        schema_error(format!(
                            "column '{}' holds {} which is not {}",
                            spec.column,
                            v,
                            spec.kind.as_str()
                        ))
                    })
                })
                .collect::<SnapshotResult<Vec<_>>>()?;
            columns.push(decoded.into_iter());
        }

        let mut records = KeyedTable::new();
        for _ in 0..manifest.row_count {
            let values = columns
                .iter_mut()
                .map(|c| c.next().unwrap_or(FieldValue::Null))
                .collect();
            let record = Row::new(T::FIELDS, values)
                .and_then(T::from_row)
                .map_err(|source| SnapshotError::Row {
                    path: path.clone(),
                    entity: T::ENTITY,
                    source,
                })?;
            records.insert(record.key().to_string(), record);
        }

        debug!(
            "Read {} rows of table {} from {:?}",
            records.len(),
            manifest.table,
            path
        );
        Ok(records)
    }
}

fn write_json_entry<W: Write + std::io::Seek, V: Serialize + ?Sized>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    entry: &str,
    value: &V,
    options: SimpleFileOptions,
) -> SnapshotResult<()> {
    zip.start_file(entry, options)
        .map_err(|source| SnapshotError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::to_writer(&mut *zip, value).map_err(|source| SnapshotError::Encoding {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json_entry<R: Read + std::io::Seek, V: for<'de> Deserialize<'de>>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    entry: &str,
) -> SnapshotResult<V> {
    let mut file = archive
        .by_name(entry)
        .map_err(|source| SnapshotError::Archive {
            path: path.to_path_buf(),
            source,
        })?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)
        .map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_slice(&content).map_err(|source| SnapshotError::Encoding {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) => Value::String(s),
        FieldValue::Integer(i) => Value::from(i),
        FieldValue::Boolean(b) => Value::Bool(b),
        FieldValue::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
    }
}

fn decode_value(value: &Value, kind: FieldKind) -> Option<FieldValue> {
    if value.is_null() {
        return Some(FieldValue::Null);
    }
    match kind {
        FieldKind::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        FieldKind::Integer => value.as_i64().map(FieldValue::Integer),
        FieldKind::Boolean => value.as_bool().map(FieldValue::Boolean),
        FieldKind::Float => value.as_f64().map(FieldValue::Float),
        FieldKind::Date => value
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(FieldValue::Date),
    }
}
