//! Trait definitions for the retriever module.

use async_trait::async_trait;
use std::path::Path;

use crate::classifier::LinkClass;
use crate::link::Link;

use super::error::RetrieveError;
use super::types::{Artifact, AuthPolicy, RetrievalContext};

/// A strategy that can fetch a link into a local directory.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns the name of this strategy, used in logs and metrics.
    fn name(&self) -> &str;

    /// Whether this strategy should be tried for the link at all.
    fn is_eligible(&self, link: &Link, class: LinkClass) -> bool;

    /// Whether the strategy can run in this environment.
    ///
    /// Unavailable strategies are skipped without counting as a failure.
    async fn is_available(&self) -> bool {
        true
    }

    /// How the strategy uses the cookie file.
    fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy::Never
    }

    /// Fetches the link into `dest`.
    async fn attempt(
        &self,
        link: &Link,
        dest: &Path,
        ctx: &RetrievalContext,
    ) -> Result<Artifact, RetrieveError>;
}
