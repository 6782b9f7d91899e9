//! Mock release provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::episode::{Show, WantedEpisode};
use crate::provider::{Provider, ProviderError, ProviderPolicy, ProviderType, SearchMode, SearchRequest};
use crate::quality::Quality;
use crate::result::{Coverage, Release, ResultKind};

/// Cloneable description of a release the mock hands out.
///
/// [`Release`] owns one-shot closures, so the mock keeps these and builds a
/// fresh `Release` per search.
#[derive(Debug, Clone)]
pub struct MockRelease {
    pub name: String,
    pub url: String,
    pub size: Option<u64>,
    pub quality: Option<Quality>,
    /// Defaults to the provider's type.
    pub kind: Option<ResultKind>,
    pub coverage: Coverage,
    pub show_id: Option<u64>,
}

impl MockRelease {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            url: format!("http://mock/{}", name),
            size: None,
            quality: None,
            kind: None,
            coverage: Coverage::FromName,
            show_id: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_kind(mut self, kind: ResultKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn covering(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn for_show(mut self, show_id: u64) -> Self {
        self.show_id = Some(show_id);
        self
    }

    pub(crate) fn to_release(&self, provider_type: ProviderType) -> Release {
        let kind = self.kind.clone().unwrap_or(match provider_type {
            ProviderType::Nzb => ResultKind::Nzb,
            ProviderType::Torrent => ResultKind::torrent(),
        });
        let mut release = Release::new(self.name.clone(), self.url.clone(), kind)
            .covering(self.coverage.clone());
        release.size = self.size;
        release.quality = self.quality;
        release.show_id = self.show_id;
        release
    }
}

/// Mock implementation of the Provider trait.
///
/// Provides controllable behavior for testing:
/// - Return configurable results per search mode
/// - Record which modes were searched
/// - Simulate failures, slow responses and rate-limit skips
///
/// Clones share state, so keep a clone as a handle after moving one into
/// an engine.
#[derive(Clone)]
pub struct MockProvider {
    id: String,
    policy: ProviderPolicy,
    results: Arc<RwLock<HashMap<SearchMode, Vec<MockRelease>>>>,
    recent: Arc<RwLock<Vec<MockRelease>>>,
    downloads: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    searches: Arc<RwLock<Vec<SearchMode>>>,
    recent_calls: Arc<RwLock<usize>>,
    downloaded: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<ProviderError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    skip: Arc<AtomicBool>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("results", &"<results>")
            .field("next_error", &"<next_error>")
            .finish()
    }
}

impl MockProvider {
    /// Create a mock torrent provider with the default policy and no results.
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            policy: ProviderPolicy::default(),
            results: Arc::new(RwLock::new(HashMap::new())),
            recent: Arc::new(RwLock::new(Vec::new())),
            downloads: Arc::new(RwLock::new(HashMap::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
            recent_calls: Arc::new(RwLock::new(0)),
            downloaded: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            skip: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_policy(mut self, policy: ProviderPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Results returned for backlog searches in `mode`.
    pub async fn set_results(&self, mode: SearchMode, releases: Vec<MockRelease>) {
        self.results.write().await.insert(mode, releases);
    }

    /// Results returned for recent searches.
    pub async fn set_recent(&self, releases: Vec<MockRelease>) {
        *self.recent.write().await = releases;
    }

    /// Payload served for `url`.
    pub async fn set_download(&self, url: &str, bytes: Vec<u8>) {
        self.downloads.write().await.insert(url.to_string(), bytes);
    }

    /// The next search fails with this error.
    pub async fn set_next_error(&self, error: ProviderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Every search sleeps this long before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub fn set_should_skip(&self, skip: bool) {
        self.skip.store(skip, Ordering::SeqCst);
    }

    /// Modes of every backlog search, in call order.
    pub async fn recorded_modes(&self) -> Vec<SearchMode> {
        self.searches.read().await.clone()
    }

    pub async fn recent_calls(&self) -> usize {
        *self.recent_calls.read().await
    }

    /// URLs passed to `download`, in call order.
    pub async fn downloaded_urls(&self) -> Vec<String> {
        self.downloaded.read().await.clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.policy
    }

    fn should_skip(&self) -> bool {
        self.skip.load(Ordering::SeqCst)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, ProviderError> {
        self.searches.write().await.push(request.mode);

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        let results = self.results.read().await;
        Ok(results
            .get(&request.mode)
            .map(|releases| {
                releases
                    .iter()
                    .map(|r| r.to_release(self.policy.provider_type))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search_recent(
        &self,
        _episodes: &[(Show, WantedEpisode)],
    ) -> Result<Vec<Release>, ProviderError> {
        *self.recent_calls.write().await += 1;

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(self
            .recent
            .read()
            .await
            .iter()
            .map(|r| r.to_release(self.policy.provider_type))
            .collect())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.downloaded.write().await.push(url.to_string());
        self.downloads
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::Api(format!("no payload for {}", url)))
    }
}
