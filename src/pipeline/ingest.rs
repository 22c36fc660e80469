//! Ingest stage runner.
//!
//! Four stages run strictly in order, each one deriving its parent keys from
//! the previous table. Calls within a stage are independent and run
//! concurrently; their results are unioned by primary key in parent order,
//! so a key listed under several parents keeps the first parent's row.

use super::{PipelineError, RunReport, Stage, StageTimer, RAW_SNAPSHOTS};
use crate::catalog::{Album, Artist, KeyedTable, Record, Track, TrackFeature};
use crate::extract::{ExtractError, ExtractResult, Extractor, FeatureLookup};
use crate::snapshot::{SnapshotKind, SnapshotStore};
use crate::transform::RawTables;
use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Upstream calls in flight at once.
    pub concurrency: usize,
    /// Reuse raw snapshots of stages that already completed.
    pub resume: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            resume: false,
        }
    }
}

enum FanOutError {
    Cancelled,
    Failed(ExtractError),
}

/// Run `call` once per parent key with at most `concurrency` calls in flight.
/// Results come back in parent order whatever order the calls finish in.
/// Stops at the first failure, or as soon as `cancel` fires.
async fn fan_out<T, F, Fut>(
    parents: Vec<String>,
    concurrency: usize,
    cancel: &CancellationToken,
    call: F,
) -> Result<Vec<T>, FanOutError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ExtractResult<T>>,
{
    let mut results = std::pin::pin!(stream::iter(parents)
        .map(call)
        .buffered(concurrency.max(1)));

    let mut collected = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FanOutError::Cancelled),
            next = results.next() => match next {
                Some(Ok(value)) => collected.push(value),
                Some(Err(err)) => return Err(FanOutError::Failed(err)),
                None => break,
            },
        }
    }
    Ok(collected)
}

struct StageRun<'a> {
    store: &'a SnapshotStore,
    options: &'a IngestOptions,
    cancel: &'a CancellationToken,
}

impl StageRun<'_> {
    /// Load the stage's raw snapshot when resuming and it exists.
    fn resume<T: Record>(
        &self,
        report: &mut RunReport,
        timer: StageTimer,
        name: &str,
    ) -> Result<Option<KeyedTable<T>>, PipelineError> {
        if !self.options.resume || !self.store.exists(SnapshotKind::Raw, name) {
            return Ok(None);
        }
        let table = self
            .store
            .read::<T>(SnapshotKind::Raw, name)
            .map_err(|e| report.fail(&timer, e))?;
        report.complete(timer, table.len(), true);
        Ok(Some(table))
    }

    fn persist<T: Record>(
        &self,
        report: &mut RunReport,
        timer: StageTimer,
        name: &str,
        table: &KeyedTable<T>,
    ) -> Result<(), PipelineError> {
        self.store
            .write(SnapshotKind::Raw, name, table)
            .map_err(|e| report.fail(&timer, e))?;
        report.complete(timer, table.len(), false);
        Ok(())
    }

    fn check_cancelled(&self, report: &RunReport, timer: &StageTimer) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(report.cancelled(timer));
        }
        Ok(())
    }

    fn fan_out_error(&self, report: &RunReport, timer: &StageTimer, err: FanOutError) -> PipelineError {
        match err {
            FanOutError::Cancelled => report.cancelled(timer),
            FanOutError::Failed(err) => report.fail(timer, err),
        }
    }
}

fn union<T>(parts: Vec<KeyedTable<T>>) -> KeyedTable<T> {
    let mut table = KeyedTable::new();
    for part in parts {
        for (key, row) in part {
            table.entry(key).or_insert(row);
        }
    }
    table
}

/// Run the four ingest stages and persist each raw table.
pub async fn run_ingest(
    extractor: &Extractor,
    store: &SnapshotStore,
    artist_names: &[String],
    options: &IngestOptions,
    cancel: &CancellationToken,
    report: &mut RunReport,
) -> Result<RawTables, PipelineError> {
    let run = StageRun {
        store,
        options,
        cancel,
    };
    let concurrency = options.concurrency;

    // Artists
    let timer = report.begin(Stage::Artists);
    run.check_cancelled(report, &timer)?;
    let artists: KeyedTable<Artist> = match run.resume(report, timer, RAW_SNAPSHOTS.artists)? {
        Some(table) => table,
        None => {
            let resolved = fan_out(artist_names.to_vec(), concurrency, cancel, |name| async move {
                extractor.resolve_artist(&name).await
            })
            .await
            .map_err(|e| run.fan_out_error(report, &timer, e))?;

            let table: KeyedTable<Artist> = resolved
                .into_iter()
                .flatten()
                .map(|artist| (artist.artist_id.clone(), artist))
                .collect();
            if table.len() < artist_names.len() {
                info!(
                    "Resolved {} of {} artist names",
                    table.len(),
                    artist_names.len()
                );
            }
            run.persist(report, timer, RAW_SNAPSHOTS.artists, &table)?;
            table
        }
    };

    // Albums, one call per artist
    let timer = report.begin(Stage::Albums);
    run.check_cancelled(report, &timer)?;
    let albums: KeyedTable<Album> = match run.resume(report, timer, RAW_SNAPSHOTS.albums)? {
        Some(table) => table,
        None => {
            let parents = artists.keys().cloned().collect();
            let parts = fan_out(parents, concurrency, cancel, |artist_id| async move {
                extractor.extract_albums(&artist_id).await
            })
            .await
            .map_err(|e| run.fan_out_error(report, &timer, e))?;

            let table = union(parts);
            run.persist(report, timer, RAW_SNAPSHOTS.albums, &table)?;
            table
        }
    };

    // Tracks, one call per album
    let timer = report.begin(Stage::Tracks);
    run.check_cancelled(report, &timer)?;
    let tracks: KeyedTable<Track> = match run.resume(report, timer, RAW_SNAPSHOTS.tracks)? {
        Some(table) => table,
        None => {
            let parents = albums.keys().cloned().collect();
            let parts = fan_out(parents, concurrency, cancel, |album_id| async move {
                extractor.extract_tracks(&album_id).await
            })
            .await
            .map_err(|e| run.fan_out_error(report, &timer, e))?;

            let table = union(parts);
            run.persist(report, timer, RAW_SNAPSHOTS.tracks, &table)?;
            table
        }
    };

    // Track features, one call per track
    let timer = report.begin(Stage::TrackFeatures);
    run.check_cancelled(report, &timer)?;
    let features: KeyedTable<TrackFeature> =
        match run.resume(report, timer, RAW_SNAPSHOTS.features)? {
            Some(table) => table,
            None => {
                let parents: Vec<String> = tracks.keys().cloned().collect();
                let requested = parents.len();
                let lookups = fan_out(parents, concurrency, cancel, |track_id| async move {
                    extractor.extract_track_feature(&track_id).await
                })
                .await
                .map_err(|e| run.fan_out_error(report, &timer, e))?;

                let table: KeyedTable<TrackFeature> = lookups
                    .into_iter()
                    .filter_map(|lookup| match lookup {
                        FeatureLookup::Found(feature) => Some(feature),
                        FeatureLookup::NoFeatures => None,
                    })
                    .map(|feature| (feature.track_id.clone(), feature))
                    .collect();
                if table.len() < requested {
                    info!(
                        "{} of {} tracks have no audio features",
                        requested - table.len(),
                        requested
                    );
                }
                run.persist(report, timer, RAW_SNAPSHOTS.features, &table)?;
                table
            }
        };

    Ok(RawTables {
        artists,
        albums,
        tracks,
        features,
    })
}
