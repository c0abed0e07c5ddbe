//! Types for the sink module.

use serde::{Deserialize, Serialize};

/// Successful transfer of one link's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Destination in the sync client's notation.
    pub destination: String,
    /// Number of files handed to the sync client.
    pub files: usize,
    pub duration_ms: u64,
}

/// Outcome of the once-per-run destination diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DestinationCheck {
    /// The configured remote is known to the sync client.
    Present,
    /// The configured remote is not listed.
    Missing {
        remote: String,
        available: Vec<String>,
    },
}

impl DestinationCheck {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}
