use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::filter::WordList;
use crate::provider::ProviderPolicy;

/// Root configuration, passed explicitly into every engine entry point.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub words: WordsConfig,
    /// Track snatches and skip releases recorded as failed downloads.
    #[serde(default)]
    pub use_failed_downloads: bool,
    /// Upper bound for one provider worker in a backlog pass.
    #[serde(default = "default_provider_timeout")]
    pub provider_timeout_secs: u64,
    /// Where downloaded `.torrent` files are cached for validation.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
}

impl SearchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            words: WordsConfig::default(),
            use_failed_downloads: false,
            provider_timeout_secs: default_provider_timeout(),
            cache_dir: default_cache_dir(),
            download: DownloadConfig::default(),
            reputation: ReputationConfig::default(),
            database: DatabaseConfig::default(),
            jackett: None,
            qbittorrent: None,
        }
    }
}

fn default_provider_timeout() -> u64 {
    120
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

/// Global ignore and require word lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct WordsConfig {
    #[serde(default)]
    pub ignore: WordList,
    #[serde(default)]
    pub require: WordList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NzbMethod {
    Blackhole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentMethod {
    Blackhole,
    Qbittorrent,
}

/// Download back-end selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_nzb_method")]
    pub nzb_method: NzbMethod,
    #[serde(default = "default_torrent_method")]
    pub torrent_method: TorrentMethod,
    #[serde(default)]
    pub nzb_dir: Option<PathBuf>,
    #[serde(default)]
    pub torrent_dir: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            nzb_method: default_nzb_method(),
            torrent_method: default_torrent_method(),
            nzb_dir: None,
            torrent_dir: None,
        }
    }
}

fn default_nzb_method() -> NzbMethod {
    NzbMethod::Blackhole
}

fn default_torrent_method() -> TorrentMethod {
    TorrentMethod::Blackhole
}

/// Reputation service endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReputationConfig {
    #[serde(default = "default_srrdb_url")]
    pub srrdb_url: String,
    #[serde(default = "default_predb_url")]
    pub predb_url: String,
    #[serde(default = "default_reputation_timeout")]
    pub timeout_secs: u64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            srrdb_url: default_srrdb_url(),
            predb_url: default_predb_url(),
            timeout_secs: default_reputation_timeout(),
        }
    }
}

fn default_srrdb_url() -> String {
    "https://api.srrdb.com/v1".to_string()
}

fn default_predb_url() -> String {
    "https://predb.ovh".to_string()
}

fn default_reputation_timeout() -> u64 {
    20
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("hunter.db")
}

/// Jackett instance and the indexers used as providers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_jackett_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub indexers: Vec<IndexerConfig>,
}

fn default_jackett_timeout() -> u64 {
    30
}

/// One Jackett indexer and its provider policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexerConfig {
    /// Jackett indexer id, also the provider id.
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rpm: u32,
    #[serde(default = "default_categories")]
    pub categories: Vec<u32>,
    #[serde(flatten)]
    pub policy: ProviderPolicy,
}

fn default_rate_limit() -> u32 {
    30
}

fn default_categories() -> Vec<u32> {
    vec![5000]
}

/// qBittorrent Web API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// qBittorrent Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_qbittorrent_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub download_path: Option<String>,
    /// Add torrents paused.
    #[serde(default)]
    pub paused: bool,
}

fn default_qbittorrent_timeout() -> u64 {
    30
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub words: WordsConfig,
    pub use_failed_downloads: bool,
    pub provider_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub download: DownloadConfig,
    pub reputation: ReputationConfig,
    pub database: DatabaseConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedJackettConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qbittorrent: Option<SanitizedQBittorrentConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key: &'static str,
    pub timeout_secs: u64,
    pub indexers: Vec<IndexerConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedQBittorrentConfig {
    pub url: String,
    pub username: String,
    pub password: &'static str,
    pub category: Option<String>,
    pub paused: bool,
}

const REDACTED: &str = "[REDACTED]";

impl From<&SearchConfig> for SanitizedConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            words: config.words.clone(),
            use_failed_downloads: config.use_failed_downloads,
            provider_timeout_secs: config.provider_timeout_secs,
            cache_dir: config.cache_dir.clone(),
            download: config.download.clone(),
            reputation: config.reputation.clone(),
            database: config.database.clone(),
            jackett: config.jackett.as_ref().map(|j| SanitizedJackettConfig {
                url: j.url.clone(),
                api_key: REDACTED,
                timeout_secs: j.timeout_secs,
                indexers: j.indexers.clone(),
            }),
            qbittorrent: config.qbittorrent.as_ref().map(|q| SanitizedQBittorrentConfig {
                url: q.url.clone(),
                username: q.username.clone(),
                password: REDACTED,
                category: q.category.clone(),
                paused: q.paused,
            }),
        }
    }
}
