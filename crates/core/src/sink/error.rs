//! Error types for the sink module.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::ProcessError;

/// Errors that can occur while transferring artifacts.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sync client binary not found.
    #[error("{program} not found")]
    ToolNotFound { program: PathBuf },

    /// Sync client exited with a failure status.
    #[error("{tool} exited with code {code:?}")]
    TransferFailed {
        tool: String,
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// Sync client ran past its configured timeout.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Nothing to transfer.
    #[error("source directory is empty: {path}")]
    EmptySource { path: PathBuf },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Stderr captured from the sync client, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::TransferFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

impl From<ProcessError> for SinkError {
    fn from(err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { program } => Self::ToolNotFound { program },
            ProcessError::Timeout {
                program,
                timeout_secs,
            } => Self::Timeout {
                tool: program.display().to_string(),
                timeout_secs,
            },
            ProcessError::Io(e) => Self::Io(e),
        }
    }
}
