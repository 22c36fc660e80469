//! Catalog ETL library
//!
//! Extracts artists, albums, tracks and audio features from a streaming
//! catalog API, cleans them, and loads them into a SQLite database.

pub mod catalog;
pub mod config;
pub mod extract;
pub mod pipeline;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod sqlite_persistence;
pub mod transform;

pub use extract::Extractor;
pub use pipeline::{run_etl, PipelineError, RunReport, Stage};
pub use snapshot::SnapshotStore;
pub use source::{CatalogSource, RetryPolicy, RetryingSource, SpotifyClient};
