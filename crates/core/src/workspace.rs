//! Local artifact directory.
//!
//! Holds the bytes retrieved for the link currently being processed. The
//! directory must be empty before a link's retrieval starts and is emptied
//! again after the link finishes, whatever the outcome.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

/// Transient directory for one link's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    path: PathBuf,
}

impl ArtifactDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the directory if needed and removes anything left in it.
    ///
    /// Returns the number of stale entries removed.
    pub async fn prepare(&self) -> std::io::Result<usize> {
        fs::create_dir_all(&self.path).await?;
        self.clear().await
    }

    /// Removes every entry inside the directory, keeping the directory itself.
    ///
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> std::io::Result<usize> {
        let mut entries = match fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Clears the directory, logging instead of failing.
    pub async fn clear_logged(&self) {
        if let Err(e) = self.clear().await {
            warn!(
                dir = %self.path.display(),
                error = %e,
                "Failed to clear artifact directory"
            );
        }
    }

    /// Regular files currently in the directory, recursively, sorted.
    pub async fn files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    files.push(entry.path());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    pub async fn is_empty(&self) -> std::io::Result<bool> {
        match fs::read_dir(&self.path).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }
}
