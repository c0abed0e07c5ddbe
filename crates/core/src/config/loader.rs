use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides, e.g. `LINKRELAY_RETRY__MAX_ATTEMPTS=3`.
pub const CONFIG_ENV_PREFIX: &str = "LINKRELAY_";

/// Dedicated override for the remote destination name.
const REMOTE_ENV: &str = "RCLONE_REMOTE";

fn env_providers(figment: Figment) -> Figment {
    figment
        .merge(Env::prefixed(CONFIG_ENV_PREFIX).split("__"))
        .merge(
            Env::raw()
                .only(&[REMOTE_ENV])
                .map(|_| "sink.remote".into()),
        )
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = env_providers(Figment::new().merge(Toml::file(path)))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from defaults and environment variables only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    env_providers(Figment::new())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
