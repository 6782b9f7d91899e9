use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::SearchConfig, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// `HUNTER_JACKETT__API_KEY` overrides `jackett.api_key`.
pub fn load_config(path: &Path) -> Result<SearchConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: SearchConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("HUNTER_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<SearchConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
