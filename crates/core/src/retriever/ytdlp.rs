//! yt-dlp based extractor.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::classifier::{is_torrent, LinkClass};
use crate::config::ExtractorConfig;
use crate::link::Link;
use crate::process::{run_tool, ToolCommand};

use super::error::RetrieveError;
use super::traits::Retriever;
use super::types::{Artifact, AuthPolicy, RetrievalContext};
use super::{check_exit, ensure_safe_link};

/// Generic site extractor backed by yt-dlp.
pub struct YtDlpExtractor {
    config: ExtractorConfig,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ExtractorConfig::default())
    }

    /// Builds the yt-dlp invocation for one attempt.
    pub fn build_command(&self, link: &Link, dest: &Path, ctx: &RetrievalContext) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.config.program)
            .args(["--no-playlist", "--no-progress"])
            .arg("-P")
            .arg(dest)
            .arg("-o")
            .arg(&self.config.output_template);

        // Page links are where hosting sites fingerprint clients.
        if ctx.class == LinkClass::PageOrComplex && !self.config.impersonate_target.is_empty() {
            cmd = cmd
                .arg("--impersonate")
                .arg(&self.config.impersonate_target);
        }

        if let Some(cookies) = &ctx.cookies {
            cmd = cmd.arg("--cookies").arg(cookies);
        }

        cmd.args(&self.config.extra_args)
            .arg("--")
            .arg(link.as_str())
            .timeout_secs(self.config.timeout_secs)
    }
}

#[async_trait]
impl Retriever for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    fn is_eligible(&self, link: &Link, _class: LinkClass) -> bool {
        !is_torrent(link)
    }

    fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy::RetryWithCookies
    }

    async fn attempt(
        &self,
        link: &Link,
        dest: &Path,
        ctx: &RetrievalContext,
    ) -> Result<Artifact, RetrieveError> {
        ensure_safe_link(link)?;
        let cmd = self.build_command(link, dest, ctx);
        debug!(args = ?cmd.args_lossy(), "Running yt-dlp");

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

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn link(s: &str) -> Link {
        Link::parse(s).unwrap()
    }

    #[test]
    fn test_page_link_uses_impersonation() {
        let extractor = YtDlpExtractor::with_defaults();
        let link = link("https://video.example.com/watch?v=abc");
        let ctx = RetrievalContext::new(LinkClass::PageOrComplex);

        let args = extractor
            .build_command(&link, Path::new("downloads"), &ctx)
            .args_lossy();
        assert_eq!(
            args,
            vec![
                "--no-playlist",
                "--no-progress",
                "-P",
                "downloads",
                "-o",
                "%(title).150B [%(id)s].%(ext)s",
                "--impersonate",
                "chrome",
                "--",
                "https://video.example.com/watch?v=abc",
            ]
        );
    }

    #[test]
    fn test_direct_link_skips_impersonation_and_adds_cookies() {
        let extractor = YtDlpExtractor::with_defaults();
        let link = link("https://cdn.example.com/a.mp4");
        let ctx = RetrievalContext::new(LinkClass::DirectMedia)
            .with_cookies(Some(PathBuf::from("cookies.txt")));

        let args = extractor
            .build_command(&link, Path::new("downloads"), &ctx)
            .args_lossy();
        assert!(!args.contains(&"--impersonate".to_string()));
        let pos = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[pos + 1], "cookies.txt");
        assert_eq!(args.last().unwrap(), "https://cdn.example.com/a.mp4");
    }

    #[test]
    fn test_empty_impersonate_target_disables_flag() {
        let extractor = YtDlpExtractor::new(ExtractorConfig {
            impersonate_target: String::new(),
            extra_args: vec!["--restrict-filenames".to_string()],
            ..Default::default()
        });
        let args = extractor
            .build_command(
                &link("https://example.com/page"),
                Path::new("d"),
                &RetrievalContext::new(LinkClass::PageOrComplex),
            )
            .args_lossy();
        assert!(!args.contains(&"--impersonate".to_string()));
        assert!(args.contains(&"--restrict-filenames".to_string()));
    }

    #[test]
    fn test_eligibility_excludes_torrents() {
        let extractor = YtDlpExtractor::with_defaults();
        let page = link("https://example.com/page");
        assert!(extractor.is_eligible(&page, LinkClass::PageOrComplex));
        assert!(!extractor.is_eligible(
            &link("magnet:?xt=urn:btih:ABC"),
            LinkClass::PageOrComplex
        ));
        assert_eq!(extractor.auth_policy(), AuthPolicy::RetryWithCookies);
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let temp = tempfile::TempDir::new().unwrap();
        let extractor = YtDlpExtractor::new(ExtractorConfig {
            program: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        });
        let err = extractor
            .attempt(
                &link("https://example.com/page"),
                temp.path(),
                &RetrievalContext::new(LinkClass::PageOrComplex),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::ToolNotFound { .. }));
    }

    #[tokio::test]
    async fn test_option_like_link_is_refused() {
        let temp = tempfile::TempDir::new().unwrap();
        let extractor = YtDlpExtractor::with_defaults();
        let err = extractor
            .attempt(
                &link("--exec=rm"),
                temp.path(),
                &RetrievalContext::new(LinkClass::PageOrComplex),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::UnsafeLink { .. }));
    }
}
