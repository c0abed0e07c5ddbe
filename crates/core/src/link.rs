//! Links and backlog entries.
//!
//! A [`Link`] is an opaque string (URL or magnet URI). Backlog files store one
//! entry per line, either a bare link or `link<TAB>attempts` once the link has
//! been re-queued at least once.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalized, non-empty link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    /// Normalizes a raw line into a link.
    ///
    /// Surrounding whitespace (including a trailing `\r` from CRLF files) is
    /// stripped. Returns `None` for blank lines and `#` comments.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Returns the link as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the link, returning the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Link {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A link waiting in the backlog, with the number of failed runs so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub link: Link,
    pub attempts: u32,
}

impl BacklogEntry {
    /// A freshly queued entry.
    pub fn new(link: Link) -> Self {
        Self { link, attempts: 0 }
    }

    /// Same link with one more recorded failure.
    pub fn next_attempt(&self) -> Self {
        Self {
            link: self.link.clone(),
            attempts: self.attempts.saturating_add(1),
        }
    }

    /// Parses a backlog line.
    ///
    /// A trailing `<TAB><number>` is read as the attempt counter; anything
    /// else after a tab stays part of the link.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some((link, attempts)) = line.rsplit_once('\t') {
            if let Ok(attempts) = attempts.trim().parse::<u32>() {
                return Link::parse(link).map(|link| Self { link, attempts });
            }
        }
        Link::parse(line).map(Self::new)
    }

    /// Renders the entry as a backlog line (without newline).
    pub fn to_line(&self) -> String {
        if self.attempts == 0 {
            self.link.to_string()
        } else {
            format!("{}\t{}", self.link, self.attempts)
        }
    }
}

impl From<Link> for BacklogEntry {
    fn from(link: Link) -> Self {
        Self::new(link)
    }
}

/// Parses every non-blank line of a backlog file.
pub fn parse_backlog(contents: &str) -> Vec<BacklogEntry> {
    contents.lines().filter_map(BacklogEntry::parse_line).collect()
}

/// Parses a record log (completed/failed), one link per line.
pub fn parse_links(contents: &str) -> Vec<Link> {
    contents.lines().filter_map(Link::parse).collect()
}
