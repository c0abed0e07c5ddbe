//! Run driver.
//!
//! One run takes a snapshot of the backlog and drives every link in it,
//! strictly one at a time, through retrieval, upload, and outcome routing:
//! - **Snapshotting**: recover a torn run, dedup the failed log, freeze the
//!   backlog.
//! - **Iterating**: cascade, then sink, then record the outcome.
//! - **Draining**: remove the snapshot.
//!
//! Link-level failures never abort a run; only state-store errors do.

mod runner;
mod types;

pub use runner::RunDriver;
pub use types::{FailureKind, LinkOutcome, RunError, RunPhase, RunReport};
