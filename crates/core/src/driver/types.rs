//! Types for the run driver.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A state file could not be read or written.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// The artifact directory could not be created or emptied.
    #[error("artifact directory {path}: {source}")]
    Artifacts {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another run is in progress on this driver.
    #[error("a run is already in progress")]
    AlreadyRunning,
}

/// Stage of the link pipeline that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No eligible strategy succeeded.
    Retrieval,
    /// The sink reported failure.
    Upload,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieval => f.write_str("retrieval"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// How one link left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Retrieved and uploaded; recorded in the completed log.
    Completed { strategy: String, files: usize },
    /// Retrieval failed; recorded as failed and re-queued.
    RetrievalFailed { attempts: u32 },
    /// Upload failed; recorded as failed and re-queued.
    UploadFailed { attempts: u32 },
    /// Failed with the retry budget spent; recorded as failed, not re-queued.
    PermanentFailure { kind: FailureKind, attempts: u32 },
}

impl LinkOutcome {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::RetrievalFailed { .. } => "retrieval_failed",
            Self::UploadFailed { .. } => "upload_failed",
            Self::PermanentFailure { .. } => "permanent_failure",
        }
    }

    /// Whether the link went back into the backlog.
    pub fn is_requeued(&self) -> bool {
        matches!(
            self,
            Self::RetrievalFailed { .. } | Self::UploadFailed { .. }
        )
    }
}

/// Backlog lifecycle phase of the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Snapshotting,
    Iterating,
    Draining,
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Links taken from the snapshot and driven to an outcome.
    pub processed: usize,
    pub completed: usize,
    pub retrieval_failed: usize,
    pub upload_failed: usize,
    pub permanent_failures: usize,
    /// Entries restored from a snapshot left by an interrupted run.
    pub recovered_from_torn_run: usize,
    pub failed_log_duplicates_removed: usize,
    /// The sink did not list the configured destination.
    pub destination_warning: bool,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            processed: 0,
            completed: 0,
            retrieval_failed: 0,
            upload_failed: 0,
            permanent_failures: 0,
            recovered_from_torn_run: 0,
            failed_log_duplicates_removed: 0,
            destination_warning: false,
        }
    }

    /// Counts one link outcome.
    pub fn record(&mut self, outcome: &LinkOutcome) {
        self.processed += 1;
        match outcome {
            LinkOutcome::Completed { .. } => self.completed += 1,
            LinkOutcome::RetrievalFailed { .. } => self.retrieval_failed += 1,
            LinkOutcome::UploadFailed { .. } => self.upload_failed += 1,
            LinkOutcome::PermanentFailure { .. } => self.permanent_failures += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Nothing was processed.
    pub fn is_idle(&self) -> bool {
        self.processed == 0
    }

    /// Links that did not complete this run.
    pub fn failed(&self) -> usize {
        self.retrieval_failed + self.upload_failed + self.permanent_failures
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
