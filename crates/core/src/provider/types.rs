use async_trait::async_trait;
use thiserror::Error;

use super::{ProviderPolicy, SearchMode};
use crate::episode::{Show, WantedEpisode};
use crate::result::Release;

/// Errors from release providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Rate limited by provider {provider}, retry in {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Authentication failures are not retried within a pass.
    pub fn is_auth(&self) -> bool {
        matches!(self, ProviderError::Auth(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::ConnectionFailed(e.to_string())
        } else {
            ProviderError::Api(e.to_string())
        }
    }
}

/// One backlog query handed to a provider.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub show: Show,
    pub episodes: Vec<WantedEpisode>,
    pub mode: SearchMode,
    pub manual: bool,
    pub try_other_searches: bool,
}

/// A source of NZB or torrent releases.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable identifier used in logs, history and failed-download matching.
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    fn policy(&self) -> &ProviderPolicy;

    fn is_active(&self) -> bool {
        self.policy().active
    }

    /// True after the provider signalled that further requests should wait.
    fn should_skip(&self) -> bool {
        false
    }

    /// Backlog search for the requested episodes in the given mode.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, ProviderError>;

    /// Recent releases feed, filtered to what could match `episodes`.
    async fn search_recent(
        &self,
        episodes: &[(Show, WantedEpisode)],
    ) -> Result<Vec<Release>, ProviderError>;

    /// Download a payload (`.torrent` or `.nzb`) from one of this provider's URLs.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}
