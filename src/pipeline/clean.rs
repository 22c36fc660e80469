use super::{PipelineError, RunReport, Stage, CLEANED_SNAPSHOTS, RAW_SNAPSHOTS};
use crate::snapshot::{SnapshotKind, SnapshotResult, SnapshotStore};
use crate::transform::rules::CleaningRules;
use crate::transform::{transform, CleanedTables, RawTables};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A fixed seed makes imputation reproducible across runs.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => {
            debug!("Seeding imputation with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Read the four raw snapshots written by a previous ingest.
pub fn read_raw_tables(store: &SnapshotStore) -> SnapshotResult<RawTables> {
    Ok(RawTables {
        artists: store.read(SnapshotKind::Raw, RAW_SNAPSHOTS.artists)?,
        albums: store.read(SnapshotKind::Raw, RAW_SNAPSHOTS.albums)?,
        tracks: store.read(SnapshotKind::Raw, RAW_SNAPSHOTS.tracks)?,
        features: store.read(SnapshotKind::Raw, RAW_SNAPSHOTS.features)?,
    })
}

fn write_cleaned_tables(store: &SnapshotStore, tables: &CleanedTables) -> SnapshotResult<()> {
    store.write(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.artists, &tables.artists)?;
    store.write(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.albums, &tables.albums)?;
    store.write(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.tracks, &tables.tracks)?;
    store.write(SnapshotKind::Cleaned, CLEANED_SNAPSHOTS.features, &tables.features)?;
    Ok(())
}

/// Clean the raw tables and persist the cleaned snapshots.
pub fn run_transform(
    store: &SnapshotStore,
    raw: &RawTables,
    rules: &CleaningRules,
    rng: &mut StdRng,
    cancel: &CancellationToken,
    report: &mut RunReport,
) -> Result<CleanedTables, PipelineError> {
    let timer = report.begin(Stage::Transform);
    if cancel.is_cancelled() {
        return Err(report.cancelled(&timer));
    }

    let outcome = transform(raw, rules, rng).map_err(|e| report.fail(&timer, e))?;
    write_cleaned_tables(store, &outcome.tables).map_err(|e| report.fail(&timer, e))?;

    let rows = outcome.tables.artists.len()
        + outcome.tables.albums.len()
        + outcome.tables.tracks.len()
        + outcome.tables.features.len();
    report.complete(timer, rows, false);
    Ok(outcome.tables)
}
