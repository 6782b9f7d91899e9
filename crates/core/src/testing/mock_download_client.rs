//! Mock download client for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::result::SearchResult;
use crate::snatch::{DispatchError, DownloadClient};

/// What the mock saw for one `send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentResult {
    pub name: String,
    pub url: String,
    pub kind: &'static str,
    pub priority: bool,
    pub content_len: Option<usize>,
}

/// Mock implementation of the DownloadClient trait.
///
/// Clones share state.
#[derive(Debug, Clone)]
pub struct MockDownloadClient {
    name: String,
    sent: Arc<RwLock<Vec<SentResult>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockDownloadClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sent: Arc::new(RwLock::new(Vec::new())),
            fail: Arc::new(RwLock::new(false)),
        }
    }

    /// Every send fails with an API error while set.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Results accepted so far, in call order.
    pub async fn sent(&self) -> Vec<SentResult> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, result: &SearchResult) -> Result<(), DispatchError> {
        if *self.fail.read().await {
            return Err(DispatchError::Api("mock failure".to_string()));
        }
        self.sent.write().await.push(SentResult {
            name: result.name.clone(),
            url: result.url.clone(),
            kind: result.kind.label(),
            priority: result.priority,
            content_len: result.content().map(|c| c.len()),
        });
        Ok(())
    }
}
