//! The run driver: snapshot, iterate, route, drain.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cascade::RetrievalCascade;
use crate::config::RetryConfig;
use crate::link::BacklogEntry;
use crate::metrics;
use crate::sink::{DestinationCheck, TransferSink};
use crate::store::StateStore;
use crate::workspace::ArtifactDir;

use super::types::{FailureKind, LinkOutcome, RunError, RunPhase, RunReport};

/// Drives one backlog snapshot through the pipeline.
pub struct RunDriver {
    store: Arc<dyn StateStore>,
    cascade: RetrievalCascade,
    sink: Arc<dyn TransferSink>,
    artifacts: ArtifactDir,
    retry: RetryConfig,

    // Runtime state
    running: AtomicBool,
    phase: Arc<RwLock<RunPhase>>,
}

impl RunDriver {
    pub fn new(
        store: Arc<dyn StateStore>,
        cascade: RetrievalCascade,
        sink: Arc<dyn TransferSink>,
        artifacts: ArtifactDir,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            cascade,
            sink,
            artifacts,
            retry,
            running: AtomicBool::new(false),
            phase: Arc::new(RwLock::new(RunPhase::Idle)),
        }
    }

    /// Current backlog phase.
    pub async fn phase(&self) -> RunPhase {
        *self.phase.read().await
    }

    async fn set_phase(&self, phase: RunPhase) {
        let mut current = self.phase.write().await;
        if *current != phase {
            debug!(from = ?*current, to = ?phase, "Phase change");
            *current = phase;
        }
    }

    /// Performs one processing run.
    ///
    /// Returns once every link in the snapshot has an outcome. Only state
    /// store and artifact directory errors end a run early.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Run already in progress");
            return Err(RunError::AlreadyRunning);
        }

        let run_id = Uuid::new_v4();
        let result = self
            .run_inner(run_id)
            .instrument(info_span!("run", run_id = %run_id))
            .await;

        self.set_phase(RunPhase::Idle).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        metrics::RUNS_TOTAL.inc();
        let mut report = RunReport::new(run_id);

        let stale = self.prepare_artifacts().await?;
        if stale > 0 {
            warn!(
                removed = stale,
                dir = %self.artifacts.path().display(),
                "Cleared leftover artifacts"
            );
        }

        self.set_phase(RunPhase::Snapshotting).await;

        if let Some(recovery) = self.store.recover_torn_run()? {
            warn!(
                restored = recovery.restored.len(),
                skipped = recovery.skipped,
                "Recovered snapshot left by an interrupted run"
            );
            report.recovered_from_torn_run = recovery.restored.len();
        }

        report.failed_log_duplicates_removed = self.store.dedup_failed()?;
        if report.failed_log_duplicates_removed > 0 {
            debug!(
                removed = report.failed_log_duplicates_removed,
                "Deduplicated failed log"
            );
        }

        let snapshot = self.store.snapshot_backlog()?;
        if snapshot.is_empty() {
            self.store.discard_snapshot()?;
            info!("Backlog empty, nothing to do");
            report.finish();
            return Ok(report);
        }

        let total = snapshot.len();
        info!(links = total, "Took backlog snapshot");

        report.destination_warning = !self.check_destination().await;

        self.set_phase(RunPhase::Iterating).await;
        for (index, entry) in snapshot.iter().enumerate() {
            let outcome = self
                .process_link(entry)
                .instrument(info_span!(
                    "link",
                    link = %entry.link,
                    position = index + 1,
                    total
                ))
                .await?;
            report.record(&outcome);
        }

        self.set_phase(RunPhase::Draining).await;
        self.store.discard_snapshot()?;
        report.finish();

        info!(
            processed = report.processed,
            completed = report.completed,
            retrieval_failed = report.retrieval_failed,
            upload_failed = report.upload_failed,
            permanent_failures = report.permanent_failures,
            duration_ms = report.duration_ms().unwrap_or_default(),
            "Run finished"
        );
        Ok(report)
    }

    /// Ensures the artifact directory exists and is empty.
    async fn prepare_artifacts(&self) -> Result<usize, RunError> {
        self.artifacts
            .prepare()
            .await
            .map_err(|source| RunError::Artifacts {
                path: self.artifacts.path().to_path_buf(),
                source,
            })
    }

    /// Runs the destination diagnostic. Returns false when it raised a warning.
    async fn check_destination(&self) -> bool {
        match self.sink.check_destination().await {
            Ok(DestinationCheck::Present) => {
                debug!(sink = self.sink.name(), "Destination present");
                true
            }
            Ok(DestinationCheck::Missing { remote, available }) => {
                warn!(
                    remote = %remote,
                    available = ?available,
                    "Remote destination not configured; uploads will still be attempted"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Could not list remote destinations");
                false
            }
        }
    }

    /// Drives one link to an outcome and records it.
    async fn process_link(&self, entry: &BacklogEntry) -> Result<LinkOutcome, RunError> {
        let start = Instant::now();
        let link = &entry.link;
        info!(previous_failures = entry.attempts, "Processing link");

        self.prepare_artifacts().await?;

        let cascade = self.cascade.retrieve(link, &self.artifacts).await;
        let outcome = match cascade.artifact {
            None => {
                warn!(
                    class = %cascade.class,
                    strategies_tried = cascade.attempts.len(),
                    "Retrieval failed"
                );
                self.route_failure(entry, FailureKind::Retrieval)?
            }
            Some(artifact) => match self.sink.transfer(self.artifacts.path()).await {
                Ok(receipt) => {
                    metrics::UPLOADS_TOTAL.with_label_values(&["success"]).inc();
                    self.store.append_completed(link)?;
                    info!(
                        strategy = %artifact.strategy,
                        files = receipt.files,
                        destination = %receipt.destination,
                        "Link completed"
                    );
                    LinkOutcome::Completed {
                        strategy: artifact.strategy,
                        files: receipt.files,
                    }
                }
                Err(e) => {
                    metrics::UPLOADS_TOTAL.with_label_values(&["failed"]).inc();
                    warn!(
                        error = %e,
                        stderr = e.stderr().unwrap_or(""),
                        "Upload failed"
                    );
                    self.route_failure(entry, FailureKind::Upload)?
                }
            },
        };

        self.artifacts.clear_logged().await;

        let label = outcome.label();
        metrics::LINKS_TOTAL.with_label_values(&[label]).inc();
        metrics::LINK_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        Ok(outcome)
    }

    /// Records a failure and decides whether the link gets another run.
    fn route_failure(
        &self,
        entry: &BacklogEntry,
        kind: FailureKind,
    ) -> Result<LinkOutcome, RunError> {
        self.store.append_failed(&entry.link)?;

        let next = entry.next_attempt();
        if self.retry.is_exhausted(next.attempts) {
            error!(
                kind = %kind,
                attempts = next.attempts,
                max_attempts = self.retry.max_attempts,
                "Retry budget exhausted, dropping link"
            );
            return Ok(LinkOutcome::PermanentFailure {
                kind,
                attempts: next.attempts,
            });
        }

        self.store.append_backlog(&next)?;
        info!(kind = %kind, attempts = next.attempts, "Re-queued link");
        Ok(match kind {
            FailureKind::Retrieval => LinkOutcome::RetrievalFailed {
                attempts: next.attempts,
            },
            FailureKind::Upload => LinkOutcome::UploadFailed {
                attempts: next.attempts,
            },
        })
    }
}
