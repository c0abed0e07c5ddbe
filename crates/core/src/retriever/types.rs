//! Types for the retriever module.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::LinkClass;
use crate::workspace::ArtifactDir;

/// How a strategy uses the cookie file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPolicy {
    /// Never receives cookies.
    Never,
    /// First attempt without cookies; one retry with cookies if that fails.
    RetryWithCookies,
    /// Receives cookies on its only attempt whenever they exist.
    Always,
}

/// Per-attempt inputs beyond the link itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalContext {
    pub class: LinkClass,
    /// Cookie file to authenticate with on this attempt.
    pub cookies: Option<PathBuf>,
}

impl RetrievalContext {
    pub fn new(class: LinkClass) -> Self {
        Self {
            class,
            cookies: None,
        }
    }

    pub fn with_cookies(mut self, cookies: Option<PathBuf>) -> Self {
        self.cookies = cookies;
        self
    }
}

/// What a successful attempt left in the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Strategy that produced the files.
    pub strategy: String,
    pub files: Vec<PathBuf>,
}

impl Artifact {
    /// Lists whatever the strategy wrote into `dir`.
    pub async fn collect(strategy: &str, dir: &Path) -> std::io::Result<Self> {
        Ok(Self {
            strategy: strategy.to_string(),
            files: ArtifactDir::new(dir).files().await?,
        })
    }

    pub fn total_files(&self) -> usize {
        self.files.len()
    }
}
