//! aria2c based raw fetcher.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::classifier::{is_torrent, LinkClass};
use crate::config::RawFetcherConfig;
use crate::link::Link;
use crate::process::{run_tool, ToolCommand};

use super::error::RetrieveError;
use super::traits::Retriever;
use super::types::{Artifact, RetrievalContext};
use super::{check_exit, ensure_safe_link};

/// Segmented multi-connection fetcher backed by aria2c.
///
/// Handles direct media links and is the only strategy that handles
/// torrents. Never receives cookies.
pub struct Aria2Fetcher {
    config: RawFetcherConfig,
}

impl Aria2Fetcher {
    pub fn new(config: RawFetcherConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RawFetcherConfig::default())
    }

    /// Builds the aria2c invocation for one attempt.
    pub fn build_command(&self, link: &Link, dest: &Path) -> ToolCommand {
        let connections = self.config.connections.to_string();
        ToolCommand::new(&self.config.program)
            .arg("--dir")
            .arg(dest)
            .args(["-x", &connections, "-s", &connections])
            .arg("-k")
            .arg(&self.config.chunk_size)
            .args([
                "--seed-time=0",
                "--follow-torrent=mem",
                "--console-log-level=warn",
                "--summary-interval=0",
            ])
            .args(&self.config.extra_args)
            .arg(link.as_str())
            .timeout_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl Retriever for Aria2Fetcher {
    fn name(&self) -> &str {
        "aria2c"
    }

    fn is_eligible(&self, link: &Link, class: LinkClass) -> bool {
        class == LinkClass::DirectMedia || is_torrent(link)
    }

    async fn attempt(
        &self,
        link: &Link,
        dest: &Path,
        _ctx: &RetrievalContext,
    ) -> Result<Artifact, RetrieveError> {
        ensure_safe_link(link)?;
        let cmd = self.build_command(link, dest);
        debug!(args = ?cmd.args_lossy(), "Running aria2c");

        let output = run_tool(&cmd).await?;
        check_exit(self.name(), &output)?;

        let artifact = Artifact::collect(self.name(), dest).await?;
        if artifact.files.is_empty() {
            return Err(RetrieveError::MissingOutput {
                path: dest.to_path_buf(),
            });
        }
        Ok(artifact)
    }
}
