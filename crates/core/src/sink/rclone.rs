//! rclone based transfer sink.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::SinkConfig;
use crate::process::{run_tool, ToolCommand};
use crate::workspace::ArtifactDir;

use super::error::SinkError;
use super::traits::TransferSink;
use super::types::{DestinationCheck, TransferReceipt};

/// Parses `rclone listremotes` output into bare remote names.
pub fn parse_remotes(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.trim_end_matches(':').to_string())
        .collect()
}

/// Sink that copies artifacts with `rclone copy`.
pub struct RcloneSink {
    config: SinkConfig,
}

impl RcloneSink {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SinkConfig::default())
    }

    pub fn destination(&self) -> String {
        self.config.destination()
    }

    /// Builds the copy invocation.
    pub fn build_copy_command(&self, source: &Path) -> ToolCommand {
        ToolCommand::new(&self.config.program)
            .arg("copy")
            .arg(source)
            .arg(self.destination())
            .args(&self.config.extra_args)
            .timeout_secs(self.config.timeout_secs)
    }

    pub fn build_listremotes_command(&self) -> ToolCommand {
        ToolCommand::new(&self.config.program)
            .arg("listremotes")
            .timeout_secs(self.config.timeout_secs)
            .capture_stdout()
    }

    fn failed(&self, code: Option<i32>, stderr: Option<String>) -> SinkError {
        SinkError::TransferFailed {
            tool: self.name().to_string(),
            code,
            stderr,
        }
    }
}

#[async_trait]
impl TransferSink for RcloneSink {
    fn name(&self) -> &str {
        "rclone"
    }

    async fn transfer(&self, source: &Path) -> Result<TransferReceipt, SinkError> {
        let files = ArtifactDir::new(source).files().await?;
        if files.is_empty() {
            return Err(SinkError::EmptySource {
                path: source.to_path_buf(),
            });
        }

        let start = Instant::now();
        let cmd = self.build_copy_command(source);
        debug!(args = ?cmd.args_lossy(), "Running rclone copy");

        let output = run_tool(&cmd).await?;
        if !output.success() {
            return Err(self.failed(output.status.code(), output.stderr()));
        }

        let receipt = TransferReceipt {
            destination: self.destination(),
            files: files.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            destination = %receipt.destination,
            files = receipt.files,
            duration_ms = receipt.duration_ms,
            "Transfer complete"
        );
        Ok(receipt)
    }

    async fn check_destination(&self) -> Result<DestinationCheck, SinkError> {
        let output = run_tool(&self.build_listremotes_command()).await?;
        if !output.success() {
            return Err(self.failed(output.status.code(), output.stderr()));
        }

        let available = parse_remotes(&output.stdout);
        if available.iter().any(|r| r == &self.config.remote) {
            Ok(DestinationCheck::Present)
        } else {
            Ok(DestinationCheck::Missing {
                remote: self.config.remote.clone(),
                available,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_parse_remotes() {
        assert_eq!(
            parse_remotes("gdrive:\n  b2:\n\nlocal\n"),
            vec!["gdrive", "b2", "local"]
        );
        assert!(parse_remotes("").is_empty());
    }

    #[test]
    fn test_copy_command() {
        let sink = RcloneSink::with_defaults();
        let cmd = sink.build_copy_command(Path::new("downloads"));
        assert_eq!(cmd.program, PathBuf::from("rclone"));
        assert_eq!(cmd.args_lossy(), vec!["copy", "downloads", "gdrive:downloads"]);
    }

    #[test]
    fn test_copy_command_with_extra_args() {
        let sink = RcloneSink::new(SinkConfig {
            remote: "b2".to_string(),
            path: "media".to_string(),
            extra_args: vec!["--transfers=8".to_string()],
            ..Default::default()
        });
        let args = sink.build_copy_command(Path::new("d")).args_lossy();
        assert_eq!(args, vec!["copy", "d", "b2:media", "--transfers=8"]);
    }

    #[test]
    fn test_listremotes_captures_stdout() {
        let cmd = RcloneSink::with_defaults().build_listremotes_command();
        assert!(cmd.capture_stdout);
        assert_eq!(cmd.args_lossy(), vec!["listremotes"]);
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let temp = TempDir::new().unwrap();
        let err = RcloneSink::with_defaults()
            .transfer(temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::EmptySource { .. }));
    }

    #[tokio::test]
    async fn test_missing_client_is_tool_not_found() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.mp4"), b"x").unwrap();
        let sink = RcloneSink::new(SinkConfig {
            program: PathBuf::from("/nonexistent/rclone"),
            ..Default::default()
        });

        let err = sink.transfer(temp.path()).await.unwrap_err();
        assert!(matches!(err, SinkError::ToolNotFound { .. }));
        let err = sink.check_destination().await.unwrap_err();
        assert!(matches!(err, SinkError::ToolNotFound { .. }));
    }
}
