pub mod cascade;
pub mod classifier;
pub mod config;
pub mod driver;
pub mod link;
pub mod metrics;
pub mod process;
pub mod retriever;
pub mod sink;
pub mod store;
pub mod testing;
pub mod workspace;

pub use cascade::{CascadeOutcome, RetrievalCascade, StrategyAttempt};
pub use classifier::{classify, is_torrent, LinkClass};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, CONFIG_ENV_PREFIX,
};
pub use driver::{FailureKind, LinkOutcome, RunDriver, RunError, RunPhase, RunReport};
pub use link::{BacklogEntry, Link};
pub use process::{run_tool, ProcessError, ToolCommand, ToolOutput};
pub use retriever::{
    content_filename, Aria2Fetcher, Artifact, AuthPolicy, BrowserFallback, RetrievalContext,
    RetrieveError, Retriever, YtDlpExtractor,
};
pub use sink::{DestinationCheck, RcloneSink, SinkError, TransferReceipt, TransferSink};
pub use store::{FileStateStore, MemoryStateStore, Recovery, StateStore, StoreError};
pub use workspace::ArtifactDir;
