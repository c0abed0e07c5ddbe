use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkrelay_core::{
    load_config, load_config_from_env, metrics, validate_config, ArtifactDir, Config,
    FileStateStore, RcloneSink, RetrievalCascade, RunDriver, StateStore, TransferSink,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file used when `LINKRELAY_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "linkrelay.toml";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let json = std::env::var("LINKRELAY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

/// Loads the config file, falling back to defaults and environment when the
/// default file is absent. A file named explicitly must exist.
fn load() -> Result<Config> {
    let explicit = std::env::var("LINKRELAY_CONFIG").ok().map(PathBuf::from);
    let config_path = explicit
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = if explicit.is_some() || config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!("No config file found, using defaults and environment");
        load_config_from_env().context("Failed to load config from environment")?
    };

    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run() -> Result<()> {
    init_logging();
    info!("linkrelay {}", VERSION);

    let config = load()?;

    // Short hash to correlate runs with the config they used
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        destination = %config.sink.destination(),
        state_dir = %config.state.dir.display(),
        "Configuration loaded"
    );

    let store: Arc<dyn StateStore> = Arc::new(
        FileStateStore::new(&config.state).context("Failed to open state directory")?,
    );
    let cascade = RetrievalCascade::from_config(&config);
    debug!(strategies = ?cascade.strategy_names(), "Retrieval cascade ready");
    let sink: Arc<dyn TransferSink> = Arc::new(RcloneSink::new(config.sink.clone()));

    let driver = RunDriver::new(
        store,
        cascade,
        sink,
        ArtifactDir::new(config.artifacts.resolved(&config.state)),
        config.retry.clone(),
    );

    let report = tokio::select! {
        result = driver.run() => result.context("Run aborted")?,
        _ = shutdown_signal() => {
            warn!("Interrupted; the snapshot will be recovered by the next run");
            bail!("interrupted by signal");
        }
    };

    if let Some(path) = &config.metrics.textfile {
        match metrics::write_textfile(path) {
            Ok(()) => debug!(path = %path.display(), "Wrote metrics textfile"),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to write metrics textfile"
            ),
        }
    }

    if report.is_idle() {
        info!("Nothing to process");
    } else {
        debug!(
            report = %serde_json::to_string(&report).unwrap_or_default(),
            "Run report"
        );
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
