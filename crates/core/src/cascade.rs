//! Retrieval cascade.
//!
//! Tries the configured strategies in priority order and stops at the first
//! success. Ineligible or unavailable strategies are skipped without counting
//! as failures; a failed strategy is logged and the next one is tried.
//!
//! Cookie handling follows each strategy's [`AuthPolicy`]:
//! - `Never`: one attempt, no cookies.
//! - `RetryWithCookies`: one attempt without cookies, then one more with
//!   cookies if the file exists.
//! - `Always`: one attempt, with cookies if the file exists.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::{classify, LinkClass};
use crate::config::Config;
use crate::link::Link;
use crate::metrics;
use crate::retriever::{
    Artifact, Aria2Fetcher, AuthPolicy, BrowserFallback, RetrievalContext, Retriever,
    YtDlpExtractor,
};
use crate::workspace::ArtifactDir;

/// One strategy invocation made while resolving a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub with_cookies: bool,
    /// Failure reason, `None` on success.
    pub error: Option<String>,
}

impl StrategyAttempt {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of running the cascade for one link.
#[derive(Debug, Clone)]
pub struct CascadeOutcome {
    pub class: LinkClass,
    /// What the winning strategy produced, `None` when every strategy failed
    /// or none was eligible.
    pub artifact: Option<Artifact>,
    pub attempts: Vec<StrategyAttempt>,
}

impl CascadeOutcome {
    pub fn is_success(&self) -> bool {
        self.artifact.is_some()
    }

    /// Reason the last failed attempt gave, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| a.error.as_deref())
    }
}

/// Ordered list of retrieval strategies.
pub struct RetrievalCascade {
    retrievers: Vec<Arc<dyn Retriever>>,
    cookies_file: Option<PathBuf>,
}

impl RetrievalCascade {
    /// Creates a cascade trying `retrievers` in the given order.
    pub fn new(retrievers: Vec<Arc<dyn Retriever>>) -> Self {
        Self {
            retrievers,
            cookies_file: None,
        }
    }

    /// Sets the cookie file offered to strategies that accept one.
    ///
    /// The file is only used while it exists; its presence is checked per link.
    pub fn with_cookies(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookies_file = Some(path.into());
        self
    }

    /// The production cascade: extractor, raw fetcher, browser fallback.
    pub fn from_config(config: &Config) -> Self {
        Self::new(vec![
            Arc::new(YtDlpExtractor::new(config.extractor.clone())),
            Arc::new(Aria2Fetcher::new(config.raw_fetcher.clone())),
            Arc::new(BrowserFallback::new(config.browser.clone())),
        ])
        .with_cookies(config.auth.resolved(&config.state))
    }

    /// Strategy names in priority order.
    pub fn strategy_names(&self) -> Vec<String> {
        self.retrievers.iter().map(|r| r.name().to_string()).collect()
    }

    async fn available_cookies(&self) -> Option<PathBuf> {
        let path = self.cookies_file.as_ref()?;
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Some(path.clone()),
            _ => None,
        }
    }

    /// Cookie settings to try, in order, for one strategy.
    fn cookie_plan(policy: AuthPolicy, cookies: &Option<PathBuf>) -> Vec<Option<PathBuf>> {
        match policy {
            AuthPolicy::Never => vec![None],
            AuthPolicy::Always => vec![cookies.clone()],
            AuthPolicy::RetryWithCookies => {
                let mut plan = vec![None];
                if cookies.is_some() {
                    plan.push(cookies.clone());
                }
                plan
            }
        }
    }

    /// Resolves one link into the artifact directory.
    ///
    /// The directory is cleared before every attempt so a strategy never sees
    /// a previous strategy's partial output. On overall failure it is left
    /// empty.
    pub async fn retrieve(&self, link: &Link, artifacts: &ArtifactDir) -> CascadeOutcome {
        let class = classify(link);
        let cookies = self.available_cookies().await;
        let mut attempts = Vec::new();

        debug!(class = %class, cookies = cookies.is_some(), "Classified link");

        for retriever in &self.retrievers {
            let strategy = retriever.name();
            if !retriever.is_eligible(link, class) {
                debug!(strategy, "Strategy not eligible, skipping");
                continue;
            }
            if !retriever.is_available().await {
                debug!(strategy, "Strategy not available, skipping");
                continue;
            }

            for cookie in Self::cookie_plan(retriever.auth_policy(), &cookies) {
                artifacts.clear_logged().await;

                let with_cookies = cookie.is_some();
                let ctx = RetrievalContext::new(class).with_cookies(cookie);
                info!(strategy, with_cookies, "Trying strategy");

                match retriever.attempt(link, artifacts.path(), &ctx).await {
                    Ok(artifact) => {
                        metrics::STRATEGY_ATTEMPTS
                            .with_label_values(&[strategy, "success"])
                            .inc();
                        info!(
                            strategy,
                            files = artifact.files.len(),
                            "Strategy succeeded"
                        );
                        attempts.push(StrategyAttempt {
                            strategy: strategy.to_string(),
                            with_cookies,
                            error: None,
                        });
                        return CascadeOutcome {
                            class,
                            artifact: Some(artifact),
                            attempts,
                        };
                    }
                    Err(e) => {
                        metrics::STRATEGY_ATTEMPTS
                            .with_label_values(&[strategy, "failed"])
                            .inc();
                        warn!(
                            strategy,
                            with_cookies,
                            error = %e,
                            stderr = e.stderr().unwrap_or(""),
                            "Strategy failed"
                        );
                        attempts.push(StrategyAttempt {
                            strategy: strategy.to_string(),
                            with_cookies,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        artifacts.clear_logged().await;
        if attempts.is_empty() {
            warn!(class = %class, "No eligible strategy for link");
        }

        CascadeOutcome {
            class,
            artifact: None,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRetriever;
    use tempfile::TempDir;

    fn link(s: &str) -> Link {
        Link::parse(s).unwrap()
    }

    fn setup() -> (TempDir, ArtifactDir) {
        let temp = TempDir::new().unwrap();
        let dir = ArtifactDir::new(temp.path().join("downloads"));
        std::fs::create_dir(dir.path()).unwrap();
        (temp, dir)
    }

    #[test]
    fn test_cookie_plan() {
        let cookies = Some(PathBuf::from("cookies.txt"));
        assert_eq!(
            RetrievalCascade::cookie_plan(AuthPolicy::RetryWithCookies, &cookies),
            vec![None, cookies.clone()]
        );
        assert_eq!(
            RetrievalCascade::cookie_plan(AuthPolicy::RetryWithCookies, &None),
            vec![None]
        );
        assert_eq!(
            RetrievalCascade::cookie_plan(AuthPolicy::Always, &cookies),
            vec![cookies.clone()]
        );
        assert_eq!(
            RetrievalCascade::cookie_plan(AuthPolicy::Never, &cookies),
            vec![None]
        );
    }

    #[test]
    fn test_from_config_order() {
        let cascade = RetrievalCascade::from_config(&Config::default());
        assert_eq!(cascade.strategy_names(), vec!["yt-dlp", "aria2c", "browser"]);
    }

    #[test]
    fn test_from_config_cookies_under_state_dir() {
        let mut config = Config::default();
        config.state.dir = PathBuf::from("/var/lib/linkrelay");
        let cascade = RetrievalCascade::from_config(&config);
        assert_eq!(
            cascade.cookies_file,
            Some(PathBuf::from("/var/lib/linkrelay/cookies.txt"))
        );
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let (_temp, dir) = setup();
        let first = MockRetriever::extractor();
        let second = MockRetriever::raw_fetcher();
        let cascade = RetrievalCascade::new(vec![
            Arc::new(first.clone()),
            Arc::new(second.clone()),
        ]);

        let outcome = cascade
            .retrieve(&link("https://cdn.example.com/a.mp4"), &dir)
            .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.artifact.unwrap().strategy, "mock-extractor");
        assert_eq!(first.attempt_count().await, 1);
        assert_eq!(second.attempt_count().await, 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_next_strategy() {
        let (_temp, dir) = setup();
        let first = MockRetriever::extractor();
        first.fail_all().await;
        let second = MockRetriever::raw_fetcher();
        let cascade = RetrievalCascade::new(vec![
            Arc::new(first.clone()),
            Arc::new(second.clone()),
        ]);

        let outcome = cascade
            .retrieve(&link("https://cdn.example.com/a.mp4"), &dir)
            .await;

        assert_eq!(outcome.artifact.unwrap().strategy, "mock-raw-fetcher");
        assert_eq!(outcome.attempts.len(), 2);
        assert!(!outcome.attempts[0].succeeded());
        assert!(outcome.attempts[1].succeeded());
    }

    #[tokio::test]
    async fn test_ineligible_and_unavailable_are_skipped() {
        let (_temp, dir) = setup();
        let raw = MockRetriever::raw_fetcher();
        let browser = MockRetriever::browser();
        browser.set_available(false).await;
        let cascade = RetrievalCascade::new(vec![
            Arc::new(raw.clone()),
            Arc::new(browser.clone()),
        ]);

        let outcome = cascade
            .retrieve(&link("https://example.com/watch/1"), &dir)
            .await;

        assert!(!outcome.is_success());
        assert!(outcome.attempts.is_empty());
        assert_eq!(raw.attempt_count().await, 0);
        assert_eq!(browser.attempt_count().await, 0);
    }

    #[tokio::test]
    async fn test_retry_with_cookies_when_file_exists() {
        let (temp, dir) = setup();
        let cookies = temp.path().join("cookies.txt");
        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();

        let extractor = MockRetriever::extractor();
        extractor.require_cookies(true).await;
        let cascade =
            RetrievalCascade::new(vec![Arc::new(extractor.clone())]).with_cookies(&cookies);

        let outcome = cascade
            .retrieve(&link("https://example.com/private"), &dir)
            .await;

        assert!(outcome.is_success());
        let recorded = extractor.recorded_attempts().await;
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].cookies, None);
        assert_eq!(recorded[1].cookies, Some(cookies));
    }

    #[tokio::test]
    async fn test_no_cookie_retry_without_file() {
        let (temp, dir) = setup();
        let extractor = MockRetriever::extractor();
        extractor.require_cookies(true).await;
        let cascade = RetrievalCascade::new(vec![Arc::new(extractor.clone())])
            .with_cookies(temp.path().join("missing-cookies.txt"));

        let outcome = cascade
            .retrieve(&link("https://example.com/private"), &dir)
            .await;

        assert!(!outcome.is_success());
        assert_eq!(extractor.attempt_count().await, 1);
        assert!(outcome.last_error().is_some());
    }

    #[tokio::test]
    async fn test_failure_leaves_directory_empty() {
        let (_temp, dir) = setup();
        let extractor = MockRetriever::extractor();
        extractor.fail_all().await;
        extractor.write_partial_on_failure(true).await;
        let cascade = RetrievalCascade::new(vec![Arc::new(extractor)]);

        let outcome = cascade.retrieve(&link("https://example.com/page"), &dir).await;

        assert!(!outcome.is_success());
        assert!(dir.is_empty().await.unwrap());
    }
}
