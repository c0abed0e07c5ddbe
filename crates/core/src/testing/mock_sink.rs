//! Mock transfer sink for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::sink::{DestinationCheck, SinkError, TransferReceipt, TransferSink};
use crate::workspace::ArtifactDir;

/// A recorded transfer for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTransfer {
    /// Directory handed to the sink.
    pub source: PathBuf,
    /// Files present in it at transfer time.
    pub files: Vec<PathBuf>,
    /// Whether the transfer succeeded.
    pub success: bool,
}

/// Mock implementation of the TransferSink trait.
///
/// Provides controllable behavior for testing:
/// - Record every transfer and the files it saw
/// - Simulate failure of all transfers, or of the next one only
/// - Simulate the remote being present or missing
#[derive(Debug, Clone)]
pub struct MockSink {
    remote: String,
    remotes: Arc<RwLock<Vec<String>>>,
    transfers: Arc<RwLock<Vec<RecordedTransfer>>>,
    fail_all: Arc<RwLock<bool>>,
    next_error: Arc<RwLock<Option<SinkError>>>,
    destination_checks: Arc<RwLock<usize>>,
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSink {
    /// Create a mock sink whose remote `mock-remote` is present.
    pub fn new() -> Self {
        Self {
            remote: "mock-remote".to_string(),
            remotes: Arc::new(RwLock::new(vec!["mock-remote".to_string()])),
            transfers: Arc::new(RwLock::new(Vec::new())),
            fail_all: Arc::new(RwLock::new(false)),
            next_error: Arc::new(RwLock::new(None)),
            destination_checks: Arc::new(RwLock::new(0)),
        }
    }

    /// Replace the remotes the sync client reports.
    pub async fn set_remotes(&self, remotes: Vec<String>) {
        *self.remotes.write().await = remotes;
    }

    /// Make every transfer fail.
    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Configure the next transfer to fail with the given error.
    pub async fn set_next_error(&self, error: SinkError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get all recorded transfers.
    pub async fn recorded_transfers(&self) -> Vec<RecordedTransfer> {
        self.transfers.read().await.clone()
    }

    /// Get the number of transfers attempted.
    pub async fn transfer_count(&self) -> usize {
        self.transfers.read().await.len()
    }

    /// Get the number of destination checks performed.
    pub async fn destination_check_count(&self) -> usize {
        *self.destination_checks.read().await
    }

    async fn take_error(&self) -> Option<SinkError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Some(err);
        }
        if *self.fail_all.read().await {
            return Some(SinkError::TransferFailed {
                tool: "mock-sink".to_string(),
                code: Some(1),
                stderr: Some("mock upload failure".to_string()),
            });
        }
        None
    }
}

#[async_trait]
impl TransferSink for MockSink {
    fn name(&self) -> &str {
        "mock-sink"
    }

    async fn transfer(&self, source: &Path) -> Result<TransferReceipt, SinkError> {
        let files = ArtifactDir::new(source).files().await?;
        let error = self.take_error().await;

        self.transfers.write().await.push(RecordedTransfer {
            source: source.to_path_buf(),
            files: files.clone(),
            success: error.is_none(),
        });

        match error {
            Some(err) => Err(err),
            None => Ok(TransferReceipt {
                destination: format!("{}:", self.remote),
                files: files.len(),
                duration_ms: 0,
            }),
        }
    }

    async fn check_destination(&self) -> Result<DestinationCheck, SinkError> {
        *self.destination_checks.write().await += 1;
        let available = self.remotes.read().await.clone();
        if available.contains(&self.remote) {
            Ok(DestinationCheck::Present)
        } else {
            Ok(DestinationCheck::Missing {
                remote: self.remote.clone(),
                available,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_error_applies_once() {
        let temp = tempfile::TempDir::new().unwrap();
        let sink = MockSink::new();
        sink.set_next_error(SinkError::EmptySource {
            path: temp.path().to_path_buf(),
        })
        .await;

        assert!(sink.transfer(temp.path()).await.is_err());
        assert!(sink.transfer(temp.path()).await.is_ok());
        assert_eq!(sink.transfer_count().await, 2);
    }

    #[tokio::test]
    async fn test_missing_remote() {
        let sink = MockSink::new();
        sink.set_remotes(vec!["other".to_string()]).await;

        let check = sink.check_destination().await.unwrap();
        assert!(!check.is_present());
        assert_eq!(sink.destination_check_count().await, 1);
    }
}
