use std::path::{Component, Path, PathBuf};

use super::{types::Config, ConfigError};

const MAX_CONNECTIONS: u32 = 16;

/// Validate configuration
/// Currently validates:
/// - Tool program paths are not empty
/// - Raw fetcher connection count is between 1 and 16
/// - Sink remote name is not empty and has no colon
/// - State file names are distinct
/// - The artifact directory neither is nor contains the state directory
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let programs = [
        ("extractor.program", &config.extractor.program),
        ("raw_fetcher.program", &config.raw_fetcher.program),
        ("browser.program", &config.browser.program),
        ("sink.program", &config.sink.program),
    ];
    for (key, program) in programs {
        if program.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                key
            )));
        }
    }

    if config.raw_fetcher.connections == 0 {
        return Err(ConfigError::ValidationError(
            "raw_fetcher.connections cannot be 0".to_string(),
        ));
    }

    // aria2c rejects -x above 16.
    if config.raw_fetcher.connections > MAX_CONNECTIONS {
        return Err(ConfigError::ValidationError(format!(
            "raw_fetcher.connections cannot exceed {}",
            MAX_CONNECTIONS
        )));
    }

    if config.sink.remote.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "sink.remote cannot be empty".to_string(),
        ));
    }

    if config.sink.remote.contains(':') {
        return Err(ConfigError::ValidationError(
            "sink.remote must be a remote name without ':'".to_string(),
        ));
    }

    let state = &config.state;
    let mut names = vec![
        state.backlog_file.as_str(),
        state.processing_file.as_str(),
        state.completed_file.as_str(),
        state.failed_file.as_str(),
    ];
    names.sort_unstable();
    names.dedup();
    if names.len() != 4 {
        return Err(ConfigError::ValidationError(
            "state file names must be distinct".to_string(),
        ));
    }

    // The artifact directory is emptied before every link.
    let artifacts = lexical(&config.artifacts.resolved(state));
    if lexical(&state.dir).starts_with(&artifacts) {
        return Err(ConfigError::ValidationError(format!(
            "artifacts.dir ({}) must not be or contain state.dir ({})",
            config.artifacts.dir.display(),
            state.dir.display()
        )));
    }

    Ok(())
}

/// Normalizes `.` and `..` without touching the filesystem.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
