//! Pipeline orchestration: ingest, transform and load, with per-stage timing.
//!
//! Every stage persists its output before the next one starts, so a failed
//! or cancelled run leaves the snapshots of completed stages on disk.

mod clean;
mod ingest;
mod load;

pub use clean::{read_raw_tables, run_transform, seeded_rng};
pub use ingest::{run_ingest, IngestOptions};
pub use load::{read_cleaned_tables, run_load};

use crate::extract::Extractor;
use crate::snapshot::SnapshotStore;
use crate::transform::rules::CleaningRules;
use rand::rngs::StdRng;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Artists,
    Albums,
    Tracks,
    TrackFeatures,
    Transform,
    Load,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Artists => "artist",
            Stage::Albums => "album",
            Stage::Tracks => "track",
            Stage::TrackFeatures => "track_feature",
            Stage::Transform => "transform",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot names of the four entity tables.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotNames {
    pub artists: &'static str,
    pub albums: &'static str,
    pub tracks: &'static str,
    pub features: &'static str,
}

pub const RAW_SNAPSHOTS: SnapshotNames = SnapshotNames {
    artists: "artist",
    albums: "album",
    tracks: "track",
    features: "track_feature",
};

pub const CLEANED_SNAPSHOTS: SnapshotNames = SnapshotNames {
    artists: "cleaned_artist",
    albums: "cleaned_album",
    tracks: "cleaned_track",
    features: "cleaned_track_features",
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Stage '{stage}' failed after {elapsed:.2?} (run time {total_elapsed:.2?}): {source:#}")]
    StageFailed {
        stage: Stage,
        elapsed: Duration,
        total_elapsed: Duration,
        #[source]
        source: anyhow::Error,
    },

    #[error("Cancelled during stage '{stage}' after {elapsed:.2?} (run time {total_elapsed:.2?})")]
    Cancelled {
        stage: Stage,
        elapsed: Duration,
        total_elapsed: Duration,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::StageFailed { stage, .. } | PipelineError::Cancelled { stage, .. } => {
                *stage
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: Stage,
    pub rows: usize,
    pub elapsed: Duration,
    /// Loaded from an existing snapshot instead of being recomputed.
    pub resumed: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct StageTimer {
    stage: Stage,
    started: Instant,
}

impl StageTimer {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Timing of a whole run.
#[derive(Debug, Clone)]
pub struct RunReport {
    started: Instant,
    pub stages: Vec<StageReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            stages: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn begin(&self, stage: Stage) -> StageTimer {
        info!("Starting stage '{}'", stage);
        StageTimer {
            stage,
            started: Instant::now(),
        }
    }

    pub fn complete(&mut self, timer: StageTimer, rows: usize, resumed: bool) {
        let elapsed = timer.elapsed();
        if resumed {
            info!(
                "Stage '{}' resumed from snapshot: {} rows in {:.2?}",
                timer.stage, rows, elapsed
            );
        } else {
            info!(
                "Stage '{}' retrieved and stored successfully: {} rows in {:.2?} (run time {:.2?})",
                timer.stage,
                rows,
                elapsed,
                self.elapsed()
            );
        }
        self.stages.push(StageReport {
            stage: timer.stage,
            rows,
            elapsed,
            resumed,
        });
    }

    pub fn fail(&self, timer: &StageTimer, err: impl Into<anyhow::Error>) -> PipelineError {
        let err = PipelineError::StageFailed {
            stage: timer.stage,
            elapsed: timer.elapsed(),
            total_elapsed: self.elapsed(),
            source: err.into(),
        };
        error!("{}", err);
        err
    }

    pub fn cancelled(&self, timer: &StageTimer) -> PipelineError {
        let err = PipelineError::Cancelled {
            stage: timer.stage,
            elapsed: timer.elapsed(),
            total_elapsed: self.elapsed(),
        };
        error!("{}", err);
        err
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }
}

/// Ingest, transform and load in one run.
#[allow(clippy::too_many_arguments)]
pub async fn run_etl(
    extractor: &Extractor,
    store: &SnapshotStore,
    artist_names: &[String],
    options: &IngestOptions,
    rules: &CleaningRules,
    rng: &mut StdRng,
    db_path: &Path,
    cancel: &CancellationToken,
) -> Result<RunReport, PipelineError> {
    let mut report = RunReport::new();

    let raw = run_ingest(extractor, store, artist_names, options, cancel, &mut report).await?;
    let cleaned = run_transform(store, &raw, rules, rng, cancel, &mut report)?;
    run_load(&cleaned, db_path, cancel, &mut report)?;

    info!("ETL run finished in {:.2?}", report.elapsed());
    Ok(report)
}
