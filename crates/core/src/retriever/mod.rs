//! Retrieval strategies.
//!
//! Each strategy wraps one external download tool behind the [`Retriever`]
//! trait:
//!
//! - [`YtDlpExtractor`]: generic site extractor, handles hundreds of hosting
//!   sites and can impersonate a browser for page links.
//! - [`Aria2Fetcher`]: multi-connection segmented fetcher for direct media
//!   links, and the only strategy used for torrents and magnet URIs.
//! - [`BrowserFallback`]: browser-automation helper for pages the other two
//!   could not handle. Optional; only used when installed.
//!
//! Strategies are combined by [`crate::cascade::RetrievalCascade`].
//!
//! # Example
//!
//! ```ignore
//! use linkrelay_core::retriever::{Aria2Fetcher, Retriever, RetrievalContext};
//!
//! let fetcher = Aria2Fetcher::new(config.raw_fetcher.clone());
//! let link = Link::parse("https://example.com/file.mp4").unwrap();
//! let ctx = RetrievalContext::new(classify(&link));
//! if fetcher.is_eligible(&link, ctx.class) {
//!     let artifact = fetcher.attempt(&link, Path::new("downloads"), &ctx).await?;
//!     println!("{} files", artifact.files.len());
//! }
//! ```

mod aria2;
mod browser;
mod error;
mod traits;
mod types;
mod ytdlp;

pub use aria2::Aria2Fetcher;
pub use browser::{content_filename, BrowserFallback};
pub use error::RetrieveError;
pub use traits::Retriever;
pub use types::{Artifact, AuthPolicy, RetrievalContext};
pub use ytdlp::YtDlpExtractor;

use crate::link::Link;
use crate::process::ToolOutput;

/// Rejects links that a tool could read as an option.
pub(crate) fn ensure_safe_link(link: &Link) -> Result<(), RetrieveError> {
    if link.as_str().starts_with('-') {
        return Err(RetrieveError::UnsafeLink {
            link: link.to_string(),
        });
    }
    Ok(())
}

/// Maps a finished tool run to an error when it exited unsuccessfully.
pub(crate) fn check_exit(tool: &str, output: &ToolOutput) -> Result<(), RetrieveError> {
    if output.success() {
        Ok(())
    } else {
        Err(RetrieveError::tool_failed(
            tool,
            output.status.code(),
            output.stderr(),
        ))
    }
}
