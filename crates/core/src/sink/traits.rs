//! Trait definitions for the sink module.

use async_trait::async_trait;
use std::path::Path;

use super::error::SinkError;
use super::types::{DestinationCheck, TransferReceipt};

/// Remote storage that receives retrieved artifacts.
#[async_trait]
pub trait TransferSink: Send + Sync {
    /// Returns the name of this sink implementation.
    fn name(&self) -> &str;

    /// Copies every file under `source` to the configured destination.
    ///
    /// Success means the data is in remote storage.
    async fn transfer(&self, source: &Path) -> Result<TransferReceipt, SinkError>;

    /// Checks whether the configured destination is known.
    ///
    /// Purely diagnostic: a missing destination does not stop a run.
    async fn check_destination(&self) -> Result<DestinationCheck, SinkError>;
}
