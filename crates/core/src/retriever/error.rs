//! Error types for the retriever module.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::ProcessError;

/// Errors that can occur during a retrieval attempt.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Tool binary not found.
    #[error("{program} not found")]
    ToolNotFound { program: PathBuf },

    /// Tool exited with a failure status.
    #[error("{tool} exited with code {code:?}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// Tool ran past its configured timeout.
    #[error("{tool} timed out after {timeout_secs} seconds")]
    Timeout { tool: String, timeout_secs: u64 },

    /// Tool reported success but the expected file is missing.
    #[error("expected output not produced: {path}")]
    MissingOutput { path: PathBuf },

    /// Output exists but is too small to be real content.
    #[error("output {path} is {size_bytes} bytes, expected more than {min_bytes}")]
    OutputTooSmall {
        path: PathBuf,
        size_bytes: u64,
        min_bytes: u64,
    },

    /// Link would be parsed as a command-line option.
    #[error("refusing link that starts with '-': {link}")]
    UnsafeLink { link: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrieveError {
    /// Creates a tool failed error.
    pub fn tool_failed(
        tool: impl Into<String>,
        code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            code,
            stderr,
        }
    }

    /// Stderr captured from the tool, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}

impl From<ProcessError> for RetrieveError {
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
