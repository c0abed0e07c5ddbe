//! State store trait and shared policies.

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::link::{BacklogEntry, Link};

/// Errors from reading or writing state.
///
/// These are the only errors that abort a run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A state file could not be read or written.
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// What torn-run recovery put back into the backlog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recovery {
    /// Entries moved from the stale snapshot back into the backlog.
    pub restored: Vec<BacklogEntry>,
    /// Stale entries dropped because they were completed or already queued.
    pub skipped: usize,
}

/// Storage for the backlog, the processing snapshot, and the record logs.
pub trait StateStore: Send + Sync {
    /// Reads the live backlog.
    fn load_backlog(&self) -> Result<Vec<BacklogEntry>, StoreError>;

    /// Appends one entry to the live backlog.
    fn append_backlog(&self, entry: &BacklogEntry) -> Result<(), StoreError>;

    /// Freezes the live backlog as the processing snapshot and starts a new,
    /// empty live backlog. Returns the snapshot contents.
    fn snapshot_backlog(&self) -> Result<Vec<BacklogEntry>, StoreError>;

    /// Reads a snapshot left behind by an earlier run, if any.
    fn load_snapshot(&self) -> Result<Option<Vec<BacklogEntry>>, StoreError>;

    /// Removes the processing snapshot.
    fn discard_snapshot(&self) -> Result<(), StoreError>;

    fn load_completed(&self) -> Result<Vec<Link>, StoreError>;

    fn append_completed(&self, link: &Link) -> Result<(), StoreError>;

    fn load_failed(&self) -> Result<Vec<Link>, StoreError>;

    /// Replaces the failed log.
    fn save_failed(&self, links: &[Link]) -> Result<(), StoreError>;

    fn append_failed(&self, link: &Link) -> Result<(), StoreError>;

    /// Merges a stale processing snapshot back into the backlog.
    ///
    /// Stale entries that already reached the completed log, or that are
    /// already queued again, are dropped; the rest are appended to the live
    /// backlog one by one, the same way external writers add links, so
    /// nothing appended concurrently can be overwritten. Returns `None` when
    /// there was no stale snapshot.
    fn recover_torn_run(&self) -> Result<Option<Recovery>, StoreError> {
        let Some(stale) = self.load_snapshot()? else {
            return Ok(None);
        };

        let completed: HashSet<Link> = self.load_completed()?.into_iter().collect();
        let queued: HashSet<Link> = self
            .load_backlog()?
            .into_iter()
            .map(|e| e.link)
            .collect();

        let total = stale.len();
        let mut seen = HashSet::new();
        let restored: Vec<BacklogEntry> = stale
            .into_iter()
            .filter(|e| {
                !completed.contains(&e.link)
                    && !queued.contains(&e.link)
                    && seen.insert(e.link.clone())
            })
            .collect();

        for entry in &restored {
            self.append_backlog(entry)?;
        }
        self.discard_snapshot()?;

        Ok(Some(Recovery {
            skipped: total - restored.len(),
            restored,
        }))
    }

    /// Removes repeated links from the failed log, keeping first occurrences.
    ///
    /// Returns the number of lines removed.
    fn dedup_failed(&self) -> Result<usize, StoreError> {
        let failed = self.load_failed()?;
        let before = failed.len();

        let mut seen = HashSet::new();
        let unique: Vec<Link> = failed
            .into_iter()
            .filter(|link| seen.insert(link.clone()))
            .collect();

        let removed = before - unique.len();
        if removed > 0 {
            self.save_failed(&unique)?;
        }
        Ok(removed)
    }
}
