//! Link classification.
//!
//! Decides which retrieval strategies a link is eligible for. Pure string
//! heuristics: no network access, no URL parsing beyond stripping the query
//! string and fragment.

use std::fmt;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::link::Link;

/// Classification tag for a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkClass {
    /// Points straight at a media byte stream or playlist.
    DirectMedia,
    /// A webpage, torrent, magnet URI, or anything needing extraction.
    PageOrComplex,
}

impl LinkClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectMedia => "direct-media",
            Self::PageOrComplex => "page-or-complex",
        }
    }
}

impl fmt::Display for LinkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static MEDIA_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\.(mp4|m4v|mkv|webm|avi|mov|wmv|flv|mpg|mpeg|ts|3gp",
        r"|mp3|m4a|aac|flac|wav|ogg|opus|m3u8|mpd)$",
    ))
    .expect("media extension pattern is valid")
});

static STREAM_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)/(hls|dash)/|/manifest(\.|/|$)|/playlist\.m3u8?")
        .expect("stream path pattern is valid")
});

static TORRENT_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.torrent$").expect("torrent pattern is valid"));

/// Strips `?query` and `#fragment` from a link.
fn path_part(link: &str) -> &str {
    let end = link.find(['?', '#']).unwrap_or(link.len());
    &link[..end]
}

/// Whether the link identifies a torrent (magnet URI or `.torrent` file).
pub fn is_torrent(link: &Link) -> bool {
    let raw = link.as_str();
    let magnet = raw
        .get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("magnet:"));
    magnet || TORRENT_FILE.is_match(path_part(raw))
}

/// Classifies a link.
pub fn classify(link: &Link) -> LinkClass {
    if is_torrent(link) {
        return LinkClass::PageOrComplex;
    }

    let path = path_part(link.as_str());
    if MEDIA_EXTENSION.is_match(path) || STREAM_PATH.is_match(path) {
        LinkClass::DirectMedia
    } else {
        LinkClass::PageOrComplex
    }
}
