//! Run lifecycle integration tests.
//!
//! These tests drive whole runs over the flat-file state store with mock
//! strategies and a mock sink:
//! - Outcome routing (completed, re-queued, permanent failure)
//! - Snapshot isolation from concurrent backlog appends
//! - Artifact directory hygiene between links
//! - Failed log dedup and torn-run recovery

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use linkrelay_core::{
    classify,
    config::RetryConfig,
    testing::{fixtures, MockRetriever, MockSink},
    ArtifactDir, BacklogEntry, FileStateStore, Link, RunDriver, RunPhase, StateStore,
};

/// Test helper wiring a driver to a temp state directory.
struct TestHarness {
    store: Arc<FileStateStore>,
    extractor: MockRetriever,
    raw_fetcher: MockRetriever,
    browser: MockRetriever,
    sink: MockSink,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(fixtures::file_store(&temp_dir.path().join("state")));
        let (extractor, raw_fetcher, browser) = fixtures::mock_strategies();

        Self {
            store,
            extractor,
            raw_fetcher,
            browser,
            sink: MockSink::new(),
            temp_dir,
        }
    }

    fn driver(&self, max_attempts: u32) -> RunDriver {
        fixtures::driver(
            self.store.clone(),
            &[
                self.extractor.clone(),
                self.raw_fetcher.clone(),
                self.browser.clone(),
            ],
            &self.sink,
            self.temp_dir.path(),
            RetryConfig { max_attempts },
        )
    }

    fn artifacts(&self) -> ArtifactDir {
        ArtifactDir::new(self.temp_dir.path().join("downloads"))
    }

    fn write_backlog(&self, contents: &str) {
        fs::write(self.store.backlog_path(), contents).unwrap();
    }

    fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).unwrap_or_default()
    }

    fn backlog(&self) -> String {
        self.read(self.store.backlog_path())
    }

    fn completed(&self) -> String {
        self.read(self.store.completed_path())
    }

    fn failed(&self) -> String {
        self.read(self.store.failed_path())
    }
}

#[tokio::test]
async fn test_direct_media_via_raw_fetcher() {
    let h = TestHarness::new();
    h.write_backlog("https://example.com/file.mp4\n");
    h.extractor.fail_all().await;

    let report = h.driver(10).run().await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(h.completed(), "https://example.com/file.mp4\n");
    assert_eq!(h.backlog(), "");
    assert_eq!(h.failed(), "");
    assert!(h.artifacts().is_empty().await.unwrap());
    assert!(!h.store.processing_path().exists());

    let transfers = h.sink.recorded_transfers().await;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].files.len(), 1);
    assert_eq!(h.raw_fetcher.attempt_count().await, 1);
}

#[tokio::test]
async fn test_magnet_failure_is_requeued() {
    let h = TestHarness::new();
    h.write_backlog("magnet:?xt=urn:btih:ABC\n");
    h.raw_fetcher.fail_all().await;

    let report = h.driver(10).run().await.unwrap();

    assert_eq!(report.retrieval_failed, 1);
    assert_eq!(h.failed(), "magnet:?xt=urn:btih:ABC\n");
    assert_eq!(h.backlog(), "magnet:?xt=urn:btih:ABC\t1\n");
    assert_eq!(h.completed(), "");
    assert!(h.artifacts().is_empty().await.unwrap());

    // Torrents never reach the extractor or the browser.
    assert_eq!(h.extractor.attempt_count().await, 0);
    assert_eq!(h.browser.attempt_count().await, 0);
}

#[tokio::test]
async fn test_upload_failure_is_requeued() {
    let h = TestHarness::new();
    h.write_backlog("https://example.com/watch/42\n");
    h.sink.set_fail_all(true).await;

    let report = h.driver(10).run().await.unwrap();

    assert_eq!(report.upload_failed, 1);
    assert_eq!(h.failed(), "https://example.com/watch/42\n");
    assert_eq!(h.backlog(), "https://example.com/watch/42\t1\n");
    assert_eq!(h.completed(), "");
    assert!(h.artifacts().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_page_falls_back_to_browser() {
    let h = TestHarness::new();
    h.write_backlog("https://example.com/embed/7\n");
    h.extractor.fail_all().await;

    let report = h.driver(10).run().await.unwrap();

    assert_eq!(report.completed, 1);
    // Extractor tried once (no cookie file), raw fetcher skipped.
    assert_eq!(h.extractor.attempt_count().await, 1);
    assert_eq!(h.raw_fetcher.attempt_count().await, 0);
    assert_eq!(h.browser.attempt_count().await, 1);
}

#[tokio::test]
async fn test_every_link_lands_somewhere() {
    let h = TestHarness::new();
    let links = [
        "https://example.com/a.mp4",
        "magnet:?xt=urn:btih:DEF",
        "https://example.com/page/b",
        "https://example.com/c.m3u8",
    ];
    h.write_backlog(&format!("{}\n", links.join("\n")));
    h.raw_fetcher.fail_link("magnet:?xt=urn:btih:DEF").await;
    h.extractor.fail_link("https://example.com/page/b").await;
    h.browser.fail_link("https://example.com/page/b").await;

    let report = h.driver(10).run().await.unwrap();
    assert_eq!(report.processed, 4);

    let completed = lines(&h.completed());
    let requeued: Vec<String> = h
        .store
        .load_backlog()
        .unwrap()
        .into_iter()
        .map(|e| e.link.to_string())
        .collect();
    let failed = lines(&h.failed());

    for link in links {
        let in_completed = completed.contains(&link.to_string());
        let in_requeued = requeued.contains(&link.to_string());
        assert!(
            in_completed != in_requeued,
            "{} must be either completed or re-queued",
            link
        );
        assert_eq!(in_requeued, failed.contains(&link.to_string()));
    }
    assert_eq!(completed.len(), 2);
    assert_eq!(requeued.len(), 2);
}

fn lines(contents: &str) -> Vec<String> {
    contents.lines().map(str::to_string).collect()
}

#[tokio::test]
async fn test_snapshot_ignores_links_appended_mid_run() {
    let h = TestHarness::new();
    h.write_backlog("https://example.com/first.mp4\n");

    let store = h.store.clone();
    h.extractor
        .set_on_attempt(Arc::new(move |_link: &Link| {
            let late = BacklogEntry::new(fixtures::link("https://example.com/late.mp4"));
            store.append_backlog(&late).unwrap();
        }))
        .await;

    let report = h.driver(10).run().await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(h.completed(), "https://example.com/first.mp4\n");
    assert_eq!(h.backlog(), "https://example.com/late.mp4\n");

    let attempted: Vec<String> = h
        .extractor
        .recorded_attempts()
        .await
        .into_iter()
        .map(|a| a.link)
        .collect();
    assert_eq!(attempted, vec!["https://example.com/first.mp4"]);
}

#[tokio::test]
async fn test_artifact_dir_empty_between_links() {
    let h = TestHarness::new();
    fs::create_dir_all(h.artifacts().path()).unwrap();
    fs::write(h.artifacts().path().join("leftover.part"), b"stale").unwrap();
    h.write_backlog("https://example.com/one.mp4\nhttps://example.com/two.mp4\n");

    // Partial output from a failed attempt must not reach the sink.
    h.extractor.fail_all().await;
    h.extractor.write_partial_on_failure(true).await;

    let report = h.driver(10).run().await.unwrap();
    assert_eq!(report.completed, 2);

    let transfers = h.sink.recorded_transfers().await;
    assert_eq!(transfers.len(), 2);
    for (transfer, name) in transfers.iter().zip(["one", "two"]) {
        assert_eq!(transfer.files.len(), 1);
        let file = transfer.files[0].file_name().unwrap().to_string_lossy();
        assert!(file.contains(name), "{} should belong to {}", file, name);
    }
    assert!(h.artifacts().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_failed_log_deduplicated_at_start() {
    let h = TestHarness::new();
    fs::write(h.store.failed_path(), "a\nb\na\nc\nb\n").unwrap();

    let report = h.driver(10).run().await.unwrap();

    assert!(report.is_idle());
    assert_eq!(report.failed_log_duplicates_removed, 2);
    assert_eq!(h.failed(), "a\nb\nc\n");
}

#[tokio::test]
async fn test_retry_cap_yields_permanent_failure() {
    let h = TestHarness::new();
    h.write_backlog("https://example.com/dead.mp4\t2\n");
    h.extractor.fail_all().await;
    h.raw_fetcher.fail_all().await;

    let report = h.driver(3).run().await.unwrap();

    assert_eq!(report.permanent_failures, 1);
    assert_eq!(h.backlog(), "");
    assert_eq!(h.failed(), "https://example.com/dead.mp4\n");
}

#[tokio::test]
async fn test_unlimited_retry_keeps_requeueing() {
    let h = TestHarness::new();
    h.write_backlog("https://example.com/dead.mp4\t250\n");
    h.extractor.fail_all().await;
    h.raw_fetcher.fail_all().await;

    let report = h.driver(0).run().await.unwrap();

    assert_eq!(report.retrieval_failed, 1);
    assert_eq!(h.backlog(), "https://example.com/dead.mp4\t251\n");
}

#[tokio::test]
async fn test_torn_run_is_recovered() {
    let h = TestHarness::new();
    fs::write(
        h.store.processing_path(),
        "https://example.com/done.mp4\nhttps://example.com/pending.mp4\n",
    )
    .unwrap();
    fs::write(h.store.completed_path(), "https://example.com/done.mp4\n").unwrap();
    h.write_backlog("https://example.com/new.mp4\n");

    let report = h.driver(10).run().await.unwrap();

    assert_eq!(report.recovered_from_torn_run, 1);
    assert_eq!(report.processed, 2);
    assert_eq!(
        h.completed(),
        concat!(
            "https://example.com/done.mp4\n",
            "https://example.com/new.mp4\n",
            "https://example.com/pending.mp4\n"
        )
    );
    assert!(!h.store.processing_path().exists());
}

#[tokio::test]
async fn test_link_succeeds_on_later_run() {
    let h = TestHarness::new();
    let link = "https://example.com/flaky.mp4";
    h.write_backlog(&format!("{}\n", link));
    h.extractor.fail_all().await;
    h.raw_fetcher.fail_link(link).await;

    let driver = h.driver(10);
    let first = driver.run().await.unwrap();
    assert_eq!(first.retrieval_failed, 1);

    h.raw_fetcher.heal_link(link).await;
    let second = driver.run().await.unwrap();

    assert_eq!(second.completed, 1);
    assert_eq!(h.completed(), format!("{}\n", link));
    assert_eq!(h.backlog(), "");
    // The failed log keeps its history.
    assert_eq!(h.failed(), format!("{}\n", link));
    assert_eq!(driver.phase().await, RunPhase::Idle);
}

#[test]
fn test_classification_is_idempotent() {
    for raw in [
        "https://example.com/file.mp4",
        "magnet:?xt=urn:btih:ABC",
        "https://example.com/watch?v=1",
        "https://cdn.example.com/hls/master.m3u8?token=x",
    ] {
        let link = fixtures::link(raw);
        assert_eq!(classify(&link), classify(&link.clone()));
    }
}

#[tokio::test]
async fn test_store_paths_follow_state_dir() {
    let h = TestHarness::new();
    let expected: PathBuf = h.temp_dir.path().join("state").join("queue.txt");
    assert_eq!(h.store.backlog_path(), expected.as_path());
}
