//! Relational sink for the cleaned tables.

mod schema;

pub use schema::{ALBUM_TABLE, ARTIST_TABLE, SINK_TABLES, TRACK_FEATURES_TABLE, TRACK_TABLE};

use crate::catalog::{FieldValue, KeyedTable, Record};
use crate::sqlite_persistence::Table;
use crate::transform::CleanedTables;
use anyhow::{bail, Context, Result};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Transaction};
use std::path::Path;
use tracing::info;

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            FieldValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            FieldValue::Date(d) => ToSqlOutput::Owned(Value::Text(d.format("%Y-%m-%d").to_string())),
        })
    }
}

/// Row counts written by one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub tables: Vec<(&'static str, usize)>,
}

impl LoadReport {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, rows)| rows).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistSummary {
    pub artist_name: Option<String>,
    pub tracks: i64,
    pub mean_duration_minutes: Option<f64>,
    pub mean_danceability: Option<f64>,
}

/// Aggregates read back from a loaded sink.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSummary {
    pub artists: i64,
    pub albums: i64,
    pub tracks: i64,
    pub track_features: i64,
    pub mean_duration_minutes: Option<f64>,
    pub mean_danceability: Option<f64>,
    pub per_artist: Vec<ArtistSummary>,
}

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open (or create) the sink database, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open sink database {:?}", path))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Replace every sink table with the cleaned tables, in one transaction.
    pub fn load(&mut self, tables: &CleanedTables) -> Result<LoadReport> {
        let tx = self.conn.transaction()?;
        let report = LoadReport {
            tables: vec![
                (ARTIST_TABLE.name, replace_table(&tx, &ARTIST_TABLE, &tables.artists)?),
                (ALBUM_TABLE.name, replace_table(&tx, &ALBUM_TABLE, &tables.albums)?),
                (TRACK_TABLE.name, replace_table(&tx, &TRACK_TABLE, &tables.tracks)?),
                (
                    TRACK_FEATURES_TABLE.name,
                    replace_table(&tx, &TRACK_FEATURES_TABLE, &tables.features)?,
                ),
            ],
        };
        tx.commit().context("Failed to commit sink load")?;

        for (table, rows) in &report.tables {
            info!("Loaded {} rows into {}", rows, table);
        }
        Ok(report)
    }

    /// Check that every sink table exists with the expected layout.
    pub fn validate(&self) -> Result<()> {
        for table in SINK_TABLES {
            table.validate(&self.conn)?;
        }
        Ok(())
    }

    pub fn count(&self, table: &Table) -> Result<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.name), [], |row| {
                row.get(0)
            })
            .with_context(|| format!("Failed to count rows of {}", table.name))?;
        Ok(count)
    }

    pub fn summary(&self) -> Result<CatalogSummary> {
        self.validate()
            .context("Sink is not loaded, run the load stage first")?;

        let mean_duration_minutes: Option<f64> = self.conn.query_row(
            "SELECT AVG(duration_ms) / 60000.0 FROM track",
            [],
            |row| row.get(0),
        )?;
        let mean_danceability: Option<f64> =
            self.conn
                .query_row("SELECT AVG(danceability) FROM track_features", [], |row| {
                    row.get(0)
                })?;

        let mut stmt = self.conn.prepare(
            "SELECT ar.artist_name, COUNT(t.track_id), AVG(t.duration_ms) / 60000.0, AVG(f.danceability)
             FROM artist ar
             JOIN album al ON al.artist_id = ar.artist_id
             JOIN track t ON t.album_id = al.album_id
             LEFT JOIN track_features f ON f.track_id = t.track_id
             GROUP BY ar.artist_id
             ORDER BY ar.artist_name",
        )?;
        let per_artist = stmt
            .query_map([], |row| {
                Ok(ArtistSummary {
                    artist_name: row.get(0)?,
                    tracks: row.get(1)?,
                    mean_duration_minutes: row.get(2)?,
                    mean_danceability: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(CatalogSummary {
            artists: self.count(&ARTIST_TABLE)?,
            albums: self.count(&ALBUM_TABLE)?,
            tracks: self.count(&TRACK_TABLE)?,
            track_features: self.count(&TRACK_FEATURES_TABLE)?,
            mean_duration_minutes,
            mean_danceability,
            per_artist,
        })
    }
}

fn replace_table<T: Record>(
    tx: &Transaction,
    table: &Table,
    records: &KeyedTable<T>,
) -> Result<usize> {
    let columns = table.column_names();
    let fields: Vec<&str> = T::FIELDS.iter().map(|f| f.column).collect();
    if columns != fields {
        bail!(
            "Sink table {} does not match the {} layout",
            table.name,
            T::ENTITY
        );
    }

    table.replace(tx)?;
    let mut stmt = tx.prepare(&table.insert_sql())?;
    for record in records.values() {
        stmt.execute(params_from_iter(record.to_values()))
            .with_context(|| format!("Failed to insert {} {}", T::ENTITY, record.key()))?;
    }
    Ok(records.len())
}
