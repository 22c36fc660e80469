use super::{PipelineError, RunReport, Stage, CLEANED_SNAPSHOTS};
use crate::sink::{LoadReport, SqliteSink};
use crate::snapshot::{SnapshotKind, SnapshotResult, SnapshotStore};
use crate::transform::CleanedTables;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Read the four cleaned snapshots written by a previous transform.
pub fn read_cleaned_tables(store: &SnapshotStore) -> SnapshotResult<CleanedTables> {
    Ok(CleanedTables {
        artists: store.read(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.artists)?,
        albums: store.read(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.albums)?,
        tracks: store.read(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.tracks)?,
        features: store.read(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.features)?,
    })
}

/// Replace the sink tables at `db_path` with the cleaned tables.
pub fn run_load(
    cleaned: &CleanedTables,
    db_path: &Path,
    cancel: &CancellationToken,
    report: &mut RunReport,
) -> Result<LoadReport, PipelineError> {
    let timer = report.begin(Stage::Load);
    if cancel.is_cancelled() {
        return Err(report.cancelled(&timer));
    }

    let mut sink = SqliteSink::open(db_path).map_err(|e| report.fail(&timer, e))?;
    let loaded = sink.load(cleaned).map_err(|e| report.fail(&timer, e))?;
    report.complete(timer, loaded.total_rows(), false);
    Ok(loaded)
}
