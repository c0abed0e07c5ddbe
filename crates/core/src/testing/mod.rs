//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the retriever and sink
//! traits, allowing whole runs to be tested without the external tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use linkrelay_core::testing::{MockRetriever, MockSink};
//!
//! let fetcher = MockRetriever::raw_fetcher();
//! let sink = MockSink::new();
//!
//! // Configure mock responses
//! fetcher.fail_link("magnet:?xt=urn:btih:ABC").await;
//! sink.set_fail_all(true).await;
//! ```

mod mock_retriever;
mod mock_sink;

pub use mock_retriever::{AttemptHook, Eligibility, MockRetriever, RecordedAttempt};
pub use mock_sink::{MockSink, RecordedTransfer};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;
    use std::sync::Arc;

    use crate::cascade::RetrievalCascade;
    use crate::config::{RetryConfig, StateConfig};
    use crate::driver::RunDriver;
    use crate::link::{BacklogEntry, Link};
    use crate::store::{FileStateStore, StateStore};
    use crate::workspace::ArtifactDir;

    use super::{MockRetriever, MockSink};

    /// Parse a link, panicking on blank input.
    pub fn link(raw: &str) -> Link {
        Link::parse(raw).expect("fixture link must not be blank")
    }

    /// A backlog entry with the given failure count.
    pub fn backlog_entry(raw: &str, attempts: u32) -> BacklogEntry {
        BacklogEntry {
            link: link(raw),
            attempts,
        }
    }

    /// A file store with default file names inside `dir`.
    pub fn file_store(dir: &Path) -> FileStateStore {
        let config = StateConfig {
            dir: dir.to_path_buf(),
            ..Default::default()
        };
        FileStateStore::new(&config).expect("state dir must be creatable")
    }

    /// The three mock strategies in production order.
    pub fn mock_strategies() -> (MockRetriever, MockRetriever, MockRetriever) {
        (
            MockRetriever::extractor(),
            MockRetriever::raw_fetcher(),
            MockRetriever::browser(),
        )
    }

    /// A driver over the given store, strategies, and sink, with artifacts
    /// under `work_dir/downloads`.
    pub fn driver(
        store: Arc<dyn StateStore>,
        strategies: &[MockRetriever],
        sink: &MockSink,
        work_dir: &Path,
        retry: RetryConfig,
    ) -> RunDriver {
        let cascade = RetrievalCascade::new(
            strategies
                .iter()
                .map(|s| Arc::new(s.clone()) as Arc<dyn crate::retriever::Retriever>)
                .collect(),
        );
        RunDriver::new(
            store,
            cascade,
            Arc::new(sink.clone()),
            ArtifactDir::new(work_dir.join("downloads")),
            retry,
        )
    }
}
