use async_trait::async_trait;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::result::SearchResult;

/// Errors from handing a result to a download back-end.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download client authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Download client connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Download client API error: {0}")]
    Api(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Failed to fetch payload: {0}")]
    Fetch(#[from] ProviderError),

    #[error("No payload for {0}")]
    MissingPayload(String),

    #[error("{client} cannot take {kind} results")]
    Unsupported { client: String, kind: &'static str },
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DispatchError::Timeout
        } else if e.is_connect() {
            DispatchError::ConnectionFailed(e.to_string())
        } else {
            DispatchError::Api(e.to_string())
        }
    }
}

/// A download back-end for NZB or torrent results.
///
/// Torrent results reach `send` with their `.torrent` bytes already in
/// `content()` unless they are magnets.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, result: &SearchResult) -> Result<(), DispatchError>;
}
