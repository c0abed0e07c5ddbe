use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub raw_fetcher: RawFetcherConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Locations of the flat state files.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StateConfig {
    /// Directory holding all state files.
    #[serde(default = "default_state_dir")]
    pub dir: PathBuf,
    /// Live backlog, appended to by external writers.
    #[serde(default = "default_backlog_file")]
    pub backlog_file: String,
    /// Snapshot taken at run start; only exists while a run is in progress.
    #[serde(default = "default_processing_file")]
    pub processing_file: String,
    #[serde(default = "default_completed_file")]
    pub completed_file: String,
    #[serde(default = "default_failed_file")]
    pub failed_file: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: default_state_dir(),
            backlog_file: default_backlog_file(),
            processing_file: default_processing_file(),
            completed_file: default_completed_file(),
            failed_file: default_failed_file(),
        }
    }
}

impl StateConfig {
    pub fn backlog_path(&self) -> PathBuf {
        self.dir.join(&self.backlog_file)
    }

    pub fn processing_path(&self) -> PathBuf {
        self.dir.join(&self.processing_file)
    }

    pub fn completed_path(&self) -> PathBuf {
        self.dir.join(&self.completed_file)
    }

    pub fn failed_path(&self) -> PathBuf {
        self.dir.join(&self.failed_file)
    }

    /// Anchors a relative path at the state directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_backlog_file() -> String {
    "queue.txt".to_string()
}

fn default_processing_file() -> String {
    "queue.processing.txt".to_string()
}

fn default_completed_file() -> String {
    "completed.txt".to_string()
}

fn default_failed_file() -> String {
    "failed.txt".to_string()
}

/// Local artifact directory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_dir")]
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: default_artifacts_dir(),
        }
    }
}

impl ArtifactsConfig {
    /// Artifact directory, relative paths taken from the state directory.
    pub fn resolved(&self, state: &StateConfig) -> PathBuf {
        state.resolve(&self.dir)
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Supplementary authentication material.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Netscape-format cookie file. Only used when it exists.
    #[serde(default = "default_cookies_file")]
    pub cookies_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookies_file: default_cookies_file(),
        }
    }
}

impl AuthConfig {
    /// Cookie file location, relative paths taken from the state directory.
    pub fn resolved(&self, state: &StateConfig) -> PathBuf {
        state.resolve(&self.cookies_file)
    }
}

fn default_cookies_file() -> PathBuf {
    PathBuf::from("cookies.txt")
}

/// Retry budget for failed links.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Failed runs allowed before a link is dropped as a permanent failure.
    /// 0 means retry forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryConfig {
    /// Whether a link that has now failed `attempts` times must stop retrying.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts != 0 && attempts >= self.max_attempts
    }
}

fn default_max_attempts() -> u32 {
    10
}

/// Generic site extractor (yt-dlp).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_extractor_program")]
    pub program: PathBuf,
    /// Target passed to `--impersonate` for page links. Empty disables it.
    #[serde(default = "default_impersonate_target")]
    pub impersonate_target: String,
    /// Output template, relative to the artifact directory.
    #[serde(default = "default_output_template")]
    pub output_template: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: default_extractor_program(),
            impersonate_target: default_impersonate_target(),
            output_template: default_output_template(),
            extra_args: Vec::new(),
            timeout_secs: None,
        }
    }
}

fn default_extractor_program() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_impersonate_target() -> String {
    "chrome".to_string()
}

fn default_output_template() -> String {
    "%(title).150B [%(id)s].%(ext)s".to_string()
}

/// Multi-connection segmented fetcher (aria2c).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFetcherConfig {
    #[serde(default = "default_raw_program")]
    pub program: PathBuf,
    #[serde(default = "default_connections")]
    pub connections: u32,
    /// Segment size in aria2c notation, e.g. `1M`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for RawFetcherConfig {
    fn default() -> Self {
        Self {
            program: default_raw_program(),
            connections: default_connections(),
            chunk_size: default_chunk_size(),
            extra_args: Vec::new(),
            timeout_secs: None,
        }
    }
}

fn default_raw_program() -> PathBuf {
    PathBuf::from("aria2c")
}

fn default_connections() -> u32 {
    16
}

fn default_chunk_size() -> String {
    "1M".to_string()
}

/// Browser-automation helper.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_browser_program")]
    pub program: PathBuf,
    /// Helper script; the strategy is unavailable when it does not exist.
    #[serde(default = "default_browser_script")]
    pub script: Option<PathBuf>,
    /// Extension given to the content-addressed output filename.
    #[serde(default = "default_browser_extension")]
    pub extension: String,
    /// Outputs of this size or smaller are treated as a failed fetch.
    #[serde(default = "default_min_output_bytes")]
    pub min_output_bytes: u64,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_browser_program(),
            script: default_browser_script(),
            extension: default_browser_extension(),
            min_output_bytes: default_min_output_bytes(),
            timeout_secs: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_browser_program() -> PathBuf {
    PathBuf::from("python3")
}

fn default_browser_script() -> Option<PathBuf> {
    Some(PathBuf::from("browser_download.py"))
}

fn default_browser_extension() -> String {
    "mp4".to_string()
}

fn default_min_output_bytes() -> u64 {
    1000
}

/// Remote storage sync client (rclone).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    #[serde(default = "default_sink_program")]
    pub program: PathBuf,
    /// Remote name as listed by `rclone listremotes`, without the colon.
    #[serde(default = "default_remote")]
    pub remote: String,
    /// Folder inside the remote.
    #[serde(default = "default_remote_path")]
    pub path: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            program: default_sink_program(),
            remote: default_remote(),
            path: default_remote_path(),
            extra_args: Vec::new(),
            timeout_secs: None,
        }
    }
}

impl SinkConfig {
    /// Destination in rclone notation, e.g. `gdrive:downloads`.
    pub fn destination(&self) -> String {
        format!("{}:{}", self.remote, self.path)
    }
}

fn default_sink_program() -> PathBuf {
    PathBuf::from("rclone")
}

/// Remote used when neither the config file nor the environment names one.
pub const DEFAULT_REMOTE: &str = "gdrive";

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

fn default_remote_path() -> String {
    "downloads".to_string()
}

/// Metrics export.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Prometheus textfile written after every run.
    #[serde(default)]
    pub textfile: Option<PathBuf>,
}
