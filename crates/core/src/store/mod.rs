//! Persisted run state.
//!
//! Four flat, newline-delimited lists make up the state:
//!
//! - **Backlog**: links waiting to be processed; external writers append to it.
//! - **Processing snapshot**: the backlog frozen at run start. It only exists
//!   while a run is in progress; finding one at startup means the previous
//!   run was torn.
//! - **Completed log**: append-only record of links that were retrieved and
//!   uploaded.
//! - **Failed log**: append-only record of failures, deduplicated at run start.
//!
//! The store has a single-writer contract: only one run may use it at a time.
//! Nothing here locks the files.
//!
//! # Example
//!
//! ```ignore
//! use linkrelay_core::store::{FileStateStore, StateStore};
//!
//! let store = FileStateStore::new(&config.state)?;
//! store.recover_torn_run()?;
//! let snapshot = store.snapshot_backlog()?;
//! for entry in &snapshot {
//!     // process entry.link
//! }
//! store.discard_snapshot()?;
//! ```

mod file_store;
mod memory_store;
mod traits;

pub use file_store::FileStateStore;
pub use memory_store::MemoryStateStore;
pub use traits::{Recovery, StateStore, StoreError};
