//! Browser-automation fallback.
//!
//! Drives an external helper that opens the page in a headless browser,
//! locates the media element, and saves it under a filename chosen by us.
//! The helper's exit status alone is not trusted: the file must exist and be
//! larger than an error page would be.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

use crate::classifier::{is_torrent, LinkClass};
use crate::config::BrowserConfig;
use crate::link::Link;
use crate::process::{run_tool, ToolCommand};

use super::error::RetrieveError;
use super::traits::Retriever;
use super::types::{Artifact, AuthPolicy, RetrievalContext};
use super::{check_exit, ensure_safe_link};

/// Hex characters of the link digest kept in the filename.
const DIGEST_HEX_LEN: usize = 16;

/// Content-addressed output filename for a link.
///
/// `fallback_<first 16 hex chars of sha256(link)>.<extension>`
pub fn content_filename(link: &Link, extension: &str) -> String {
    let digest = Sha256::digest(link.as_str().as_bytes());
    let hex: String = digest
        .iter()
        .take(DIGEST_HEX_LEN / 2)
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("fallback_{}.{}", hex, extension.trim_start_matches('.'))
}

/// Last-resort strategy for web pages the extractor could not handle.
pub struct BrowserFallback {
    config: BrowserConfig,
}

impl BrowserFallback {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(BrowserConfig::default())
    }

    /// Builds the helper invocation for one attempt.
    pub fn build_command(
        &self,
        link: &Link,
        dest: &Path,
        filename: &str,
        ctx: &RetrievalContext,
    ) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.config.program);
        if let Some(script) = &self.config.script {
            cmd = cmd.arg(script);
        }
        cmd = cmd.arg(link.as_str()).arg(filename);
        if let Some(cookies) = &ctx.cookies {
            cmd = cmd.arg(cookies);
        }
        cmd.env("DOWNLOAD_DIR", dest)
            .timeout_secs(self.config.timeout_secs)
    }

    /// Checks the helper's output file.
    async fn verify_output(&self, path: &Path) -> Result<(), RetrieveError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                return Err(RetrieveError::MissingOutput {
                    path: path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetrieveError::MissingOutput {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.len() <= self.config.min_output_bytes {
            return Err(RetrieveError::OutputTooSmall {
                path: path.to_path_buf(),
                size_bytes: metadata.len(),
                min_bytes: self.config.min_output_bytes,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Retriever for BrowserFallback {
    fn name(&self) -> &str {
        "browser"
    }

    fn is_eligible(&self, link: &Link, class: LinkClass) -> bool {
        class == LinkClass::PageOrComplex && !is_torrent(link)
    }

    async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        match &self.config.script {
            Some(script) => tokio::fs::try_exists(script).await.unwrap_or(false),
            None => true,
        }
    }

    fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy::Always
    }

    async fn attempt(
        &self,
        link: &Link,
        dest: &Path,
        ctx: &RetrievalContext,
    ) -> Result<Artifact, RetrieveError> {
        ensure_safe_link(link)?;
        let filename = content_filename(link, &self.config.extension);
        let cmd = self.build_command(link, dest, &filename, ctx);
        debug!(args = ?cmd.args_lossy(), "Running browser helper");

        let output = run_tool(&cmd).await?;
        check_exit(self.name(), &output)?;

        let path = dest.join(&filename);
        self.verify_output(&path).await?;

        Ok(Artifact {
            strategy: self.name().to_string(),
            files: vec![path],
        })
    }
}
