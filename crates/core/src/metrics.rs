//! Prometheus metrics.
//!
//! This module provides metrics for:
//! - Runs (started, links processed, per-link outcome)
//! - Retrieval strategies (attempts by strategy and result)
//! - Uploads (transfers by result)
//!
//! Metrics live in a private registry. A one-shot process has no scrape
//! endpoint, so the registry is written in text exposition format to a file
//! picked up by node-exporter's textfile collector.

use std::path::Path;

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

// =============================================================================
// Run Metrics
// =============================================================================

/// Runs started total.
pub static RUNS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("linkrelay_runs_total", "Total runs started").expect("valid metric")
});

/// Links processed total by outcome.
pub static LINKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("linkrelay_links_total", "Total links processed"),
        &["outcome"], // "completed", "retrieval_failed", "upload_failed", "permanent_failure"
    )
    .expect("valid metric")
});

/// Time spent on one link, retrieval and upload included.
pub static LINK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "linkrelay_link_duration_seconds",
            "Duration of processing one link",
        )
        .buckets(vec![
            1.0, 5.0, 15.0, 30.0, 60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0,
        ]),
        &["outcome"],
    )
    .expect("valid metric")
});

// =============================================================================
// Retrieval Metrics
// =============================================================================

/// Strategy attempts total by strategy and result.
pub static STRATEGY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "linkrelay_strategy_attempts_total",
            "Total retrieval strategy attempts",
        ),
        &["strategy", "result"], // result: "success", "failed"
    )
    .expect("valid metric")
});

// =============================================================================
// Upload Metrics
// =============================================================================

/// Uploads total by result.
pub static UPLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("linkrelay_uploads_total", "Total artifact uploads"),
        &["result"], // "success", "failed"
    )
    .expect("valid metric")
});

/// Registry holding every metric above.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    for metric in all_metrics() {
        // Names are unique, so registration cannot collide.
        let _ = registry.register(metric);
    }
    registry
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RUNS_TOTAL.clone()),
        Box::new(LINKS_TOTAL.clone()),
        Box::new(LINK_DURATION.clone()),
        Box::new(STRATEGY_ATTEMPTS.clone()),
        Box::new(UPLOADS_TOTAL.clone()),
    ]
}

/// Renders the registry in text exposition format.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Writes the registry to a textfile-collector file.
///
/// Writes a sibling temp file first so the collector never reads a
/// half-written file.
pub fn write_textfile(path: &Path) -> std::io::Result<()> {
    let text = render().map_err(|e| std::io::Error::other(e.to_string()))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, text)?;
    std::fs::rename(&tmp, path)
}
