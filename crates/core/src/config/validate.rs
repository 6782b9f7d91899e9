use std::collections::HashSet;

use super::{types::SearchConfig, ConfigError, TorrentMethod};

/// Validate configuration
/// Currently validates:
/// - Provider timeout is not 0
/// - The selected torrent method has its settings
/// - Indexer ids are unique and non-empty
pub fn validate_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.provider_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "provider_timeout_secs cannot be 0".to_string(),
        ));
    }

    match config.download.torrent_method {
        TorrentMethod::Qbittorrent if config.qbittorrent.is_none() => {
            return Err(ConfigError::ValidationError(
                "download.torrent_method = \"qbittorrent\" requires a [qbittorrent] section"
                    .to_string(),
            ));
        }
        _ => {}
    }

    if let Some(jackett) = &config.jackett {
        let mut seen = HashSet::new();
        for indexer in &jackett.indexers {
            if indexer.id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "jackett indexer id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(indexer.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate jackett indexer id: {}",
                    indexer.id
                )));
            }
            if indexer.rate_limit_rpm == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "jackett indexer {} rate_limit_rpm cannot be 0",
                    indexer.id
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&SearchConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_timeout_zero_fails() {
        let config = SearchConfig {
            provider_timeout_secs: 0,
            ..SearchConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_qbittorrent_requires_section() {
        let config = load_config_from_str(
            r#"
[download]
torrent_method = "qbittorrent"
"#,
        )
        .unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_indexers() {
        let config = load_config_from_str(
            r#"
[jackett]
url = "http://localhost:9117"
api_key = "k"

[[jackett.indexers]]
id = "eztv"

[[jackett.indexers]]
id = "eztv"
"#,
        )
        .unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
