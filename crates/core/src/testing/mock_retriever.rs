//! Mock retriever for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::classifier::{is_torrent, LinkClass};
use crate::link::Link;
use crate::retriever::{Artifact, AuthPolicy, RetrievalContext, RetrieveError, Retriever};

/// Callback run at the start of every attempt.
pub type AttemptHook = Arc<dyn Fn(&Link) + Send + Sync>;

/// Which links a mock strategy accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Any,
    /// Like the extractor: anything but torrents.
    NotTorrent,
    /// Like the raw fetcher: direct media or torrents.
    DirectMediaOrTorrent,
    /// Like the browser fallback: web pages only.
    PageOnly,
}

impl Eligibility {
    fn accepts(&self, link: &Link, class: LinkClass) -> bool {
        match self {
            Self::Any => true,
            Self::NotTorrent => !is_torrent(link),
            Self::DirectMediaOrTorrent => class == LinkClass::DirectMedia || is_torrent(link),
            Self::PageOnly => class == LinkClass::PageOrComplex && !is_torrent(link),
        }
    }
}

/// A recorded attempt for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub link: String,
    pub class: LinkClass,
    pub cookies: Option<PathBuf>,
    pub success: bool,
}

/// Mock implementation of the Retriever trait.
///
/// Provides controllable behavior for testing:
/// - Succeed by default, writing one file into the destination
/// - Fail every link, or only selected links
/// - Fail unless cookies are supplied
/// - Leave partial output behind on failure
/// - Run a hook at the start of each attempt
///
/// # Example
///
/// ```rust,ignore
/// use linkrelay_core::testing::MockRetriever;
///
/// let fetcher = MockRetriever::raw_fetcher();
/// fetcher.fail_link("magnet:?xt=urn:btih:ABC").await;
///
/// let cascade = RetrievalCascade::new(vec![Arc::new(fetcher.clone())]);
/// // ... run ...
/// assert_eq!(fetcher.attempt_count().await, 1);
/// ```
#[derive(Clone)]
pub struct MockRetriever {
    name: String,
    eligibility: Eligibility,
    policy: AuthPolicy,
    available: Arc<RwLock<bool>>,
    fail_all: Arc<RwLock<bool>>,
    failing_links: Arc<RwLock<HashSet<String>>>,
    require_cookies: Arc<RwLock<bool>>,
    write_partial_on_failure: Arc<RwLock<bool>>,
    attempts: Arc<RwLock<Vec<RecordedAttempt>>>,
    on_attempt: Arc<RwLock<Option<AttemptHook>>>,
}

impl fmt::Debug for MockRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRetriever")
            .field("name", &self.name)
            .field("eligibility", &self.eligibility)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl MockRetriever {
    /// Create a mock strategy that accepts every link.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rules(name, Eligibility::Any, AuthPolicy::Never)
    }

    /// Create a mock strategy with explicit eligibility and cookie policy.
    pub fn with_rules(
        name: impl Into<String>,
        eligibility: Eligibility,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            eligibility,
            policy,
            available: Arc::new(RwLock::new(true)),
            fail_all: Arc::new(RwLock::new(false)),
            failing_links: Arc::new(RwLock::new(HashSet::new())),
            require_cookies: Arc::new(RwLock::new(false)),
            write_partial_on_failure: Arc::new(RwLock::new(false)),
            attempts: Arc::new(RwLock::new(Vec::new())),
            on_attempt: Arc::new(RwLock::new(None)),
        }
    }

    /// Stand-in for the site extractor.
    pub fn extractor() -> Self {
        Self::with_rules(
            "mock-extractor",
            Eligibility::NotTorrent,
            AuthPolicy::RetryWithCookies,
        )
    }

    /// Stand-in for the raw fetcher.
    pub fn raw_fetcher() -> Self {
        Self::with_rules(
            "mock-raw-fetcher",
            Eligibility::DirectMediaOrTorrent,
            AuthPolicy::Never,
        )
    }

    /// Stand-in for the browser fallback.
    pub fn browser() -> Self {
        Self::with_rules("mock-browser", Eligibility::PageOnly, AuthPolicy::Always)
    }

    /// Set whether the strategy reports itself available.
    pub async fn set_available(&self, available: bool) {
        *self.available.write().await = available;
    }

    /// Make every attempt fail.
    pub async fn fail_all(&self) {
        *self.fail_all.write().await = true;
    }

    /// Make attempts for one link fail.
    pub async fn fail_link(&self, link: &str) {
        self.failing_links.write().await.insert(link.to_string());
    }

    /// Let attempts for a previously failing link succeed.
    pub async fn heal_link(&self, link: &str) {
        self.failing_links.write().await.remove(link);
    }

    /// Fail any attempt made without cookies.
    pub async fn require_cookies(&self, required: bool) {
        *self.require_cookies.write().await = required;
    }

    /// Write a partial file before failing.
    pub async fn write_partial_on_failure(&self, enabled: bool) {
        *self.write_partial_on_failure.write().await = enabled;
    }

    /// Run `hook` at the start of every attempt.
    pub async fn set_on_attempt(&self, hook: AttemptHook) {
        *self.on_attempt.write().await = Some(hook);
    }

    /// Get all recorded attempts.
    pub async fn recorded_attempts(&self) -> Vec<RecordedAttempt> {
        self.attempts.read().await.clone()
    }

    /// Get the number of attempts made.
    pub async fn attempt_count(&self) -> usize {
        self.attempts.read().await.len()
    }

    async fn should_fail(&self, link: &Link, ctx: &RetrievalContext) -> bool {
        *self.fail_all.read().await
            || self.failing_links.read().await.contains(link.as_str())
            || (*self.require_cookies.read().await && ctx.cookies.is_none())
    }

    /// Output filename for a link, unique per strategy and link.
    fn output_name(&self, link: &Link) -> String {
        let slug: String = link
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(40)
            .collect();
        format!("{}-{}.bin", self.name, slug)
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_eligible(&self, link: &Link, class: LinkClass) -> bool {
        self.eligibility.accepts(link, class)
    }

    async fn is_available(&self) -> bool {
        *self.available.read().await
    }

    fn auth_policy(&self) -> AuthPolicy {
        self.policy
    }

    async fn attempt(
        &self,
        link: &Link,
        dest: &Path,
        ctx: &RetrievalContext,
    ) -> Result<Artifact, RetrieveError> {
        let hook = self.on_attempt.read().await.clone();
        if let Some(hook) = hook {
            hook(link);
        }

        tokio::fs::create_dir_all(dest).await?;
        let fail = self.should_fail(link, ctx).await;

        self.attempts.write().await.push(RecordedAttempt {
            link: link.to_string(),
            class: ctx.class,
            cookies: ctx.cookies.clone(),
            success: !fail,
        });

        if fail {
            if *self.write_partial_on_failure.read().await {
                tokio::fs::write(dest.join("partial.part"), b"partial").await?;
            }
            return Err(RetrieveError::tool_failed(
                self.name.clone(),
                Some(1),
                Some("mock failure".to_string()),
            ));
        }

        tokio::fs::write(dest.join(self.output_name(link)), link.as_str().as_bytes()).await?;
        Ok(Artifact::collect(&self.name, dest).await?)
    }
}
