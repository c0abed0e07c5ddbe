//! In-memory state store.

use std::sync::{Mutex, MutexGuard};

use crate::link::{BacklogEntry, Link};

use super::traits::{StateStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    backlog: Vec<BacklogEntry>,
    snapshot: Option<Vec<BacklogEntry>>,
    completed: Vec<Link>,
    failed: Vec<Link>,
}

/// State held in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    inner: Mutex<Inner>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose backlog holds the given links.
    pub fn with_backlog<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        store.lock().backlog = links
            .into_iter()
            .filter_map(|s| Link::parse(s.as_ref()))
            .map(BacklogEntry::new)
            .collect();
        store
    }

    /// Pretends a previous run was interrupted with this snapshot on disk.
    pub fn set_stale_snapshot(&self, entries: Vec<BacklogEntry>) {
        self.lock().snapshot = Some(entries);
    }

    /// Links currently in the backlog, in order.
    pub fn backlog_links(&self) -> Vec<String> {
        self.lock()
            .backlog
            .iter()
            .map(|e| e.link.to_string())
            .collect()
    }

    pub fn backlog_entries(&self) -> Vec<BacklogEntry> {
        self.lock().backlog.clone()
    }

    pub fn completed_links(&self) -> Vec<String> {
        self.lock().completed.iter().map(Link::to_string).collect()
    }

    pub fn failed_links(&self) -> Vec<String> {
        self.lock().failed.iter().map(Link::to_string).collect()
    }

    pub fn has_snapshot(&self) -> bool {
        self.lock().snapshot.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StateStore for MemoryStateStore {
    fn load_backlog(&self) -> Result<Vec<BacklogEntry>, StoreError> {
        Ok(self.lock().backlog.clone())
    }

    fn append_backlog(&self, entry: &BacklogEntry) -> Result<(), StoreError> {
        self.lock().backlog.push(entry.clone());
        Ok(())
    }

    fn snapshot_backlog(&self) -> Result<Vec<BacklogEntry>, StoreError> {
        let mut inner = self.lock();
        let snapshot = std::mem::take(&mut inner.backlog);
        inner.snapshot = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn load_snapshot(&self) -> Result<Option<Vec<BacklogEntry>>, StoreError> {
        Ok(self.lock().snapshot.clone())
    }

    fn discard_snapshot(&self) -> Result<(), StoreError> {
        self.lock().snapshot = None;
        Ok(())
    }

    fn load_completed(&self) -> Result<Vec<Link>, StoreError> {
        Ok(self.lock().completed.clone())
    }

    fn append_completed(&self, link: &Link) -> Result<(), StoreError> {
        self.lock().completed.push(link.clone());
        Ok(())
    }

    fn load_failed(&self) -> Result<Vec<Link>, StoreError> {
        Ok(self.lock().failed.clone())
    }

    fn save_failed(&self, links: &[Link]) -> Result<(), StoreError> {
        self.lock().failed = links.to_vec();
        Ok(())
    }

    fn append_failed(&self, link: &Link) -> Result<(), StoreError> {
        self.lock().failed.push(link.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_isolated_from_later_appends() {
        let store = MemoryStateStore::with_backlog(["https://a.test/1", "https://a.test/2"]);
        let snapshot = store.snapshot_backlog().unwrap();

        store
            .append_backlog(&BacklogEntry::new(Link::parse("https://late.test/3").unwrap()))
            .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(store.backlog_links(), vec!["https://late.test/3"]);
        assert!(store.has_snapshot());
    }

    #[test]
    fn test_dedup_failed_example() {
        let store = MemoryStateStore::new();
        for s in ["a", "b", "a", "c", "b"] {
            store.append_failed(&Link::parse(s).unwrap()).unwrap();
        }
        assert_eq!(store.dedup_failed().unwrap(), 2);
        assert_eq!(store.failed_links(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_recover_torn_run() {
        let store = MemoryStateStore::with_backlog(["https://new.test/1"]);
        store.set_stale_snapshot(vec![BacklogEntry::new(
            Link::parse("https://stale.test/0").unwrap(),
        )]);

        let recovery = store.recover_torn_run().unwrap().unwrap();
        assert_eq!(recovery.restored.len(), 1);
        assert_eq!(
            store.backlog_links(),
            vec!["https://new.test/1", "https://stale.test/0"]
        );
        assert!(!store.has_snapshot());
    }
}
