//! Jackett indexer provider.
//!
//! Every configured indexer becomes its own [`Provider`], sharing one HTTP
//! client and Jackett instance.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::rate_limiter::RateLimiter;
use super::{Provider, ProviderError, ProviderPolicy, ProviderType, SearchMode, SearchRequest};
use crate::config::{IndexerConfig, JackettConfig};
use crate::episode::{Show, WantedEpisode};
use crate::metrics;
use crate::naming::sanitize_scene_name;
use crate::result::{Release, ResultKind};

/// Cooldown applied after a 429 without a usable Retry-After header.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// One Jackett indexer.
pub struct JackettProvider {
    client: Client,
    base_url: String,
    api_key: String,
    indexer: IndexerConfig,
    limiter: RateLimiter,
}

impl JackettProvider {
    /// One provider per configured indexer.
    pub fn from_config(config: &JackettConfig) -> Result<Vec<Arc<dyn Provider>>, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(config
            .indexers
            .iter()
            .map(|indexer| {
                Arc::new(Self {
                    client: client.clone(),
                    base_url: config.url.trim_end_matches('/').to_string(),
                    api_key: config.api_key.clone(),
                    limiter: RateLimiter::new(&indexer.id, indexer.rate_limit_rpm),
                    indexer: indexer.clone(),
                }) as Arc<dyn Provider>
            })
            .collect())
    }

    /// Build the Jackett API URL for one query.
    fn build_search_url(&self, query: &str) -> String {
        let mut url = format!(
            "{}/api/v2.0/indexers/{}/results?apikey={}&Query={}",
            self.base_url,
            urlencoding::encode(&self.indexer.id),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(query)
        );
        for category in &self.indexer.categories {
            url.push_str(&format!("&Category[]={}", category));
        }
        url
    }

    /// Queries for a backlog request, one per distinct episode or season.
    fn build_queries(request: &SearchRequest) -> Vec<String> {
        let mut seen = HashSet::new();
        let show_name = &request.show.name;
        request
            .episodes
            .iter()
            .filter_map(|wanted| {
                let ep = &wanted.episode;
                let query = match request.mode {
                    SearchMode::Episode => {
                        format!("{} S{:02}E{:02}", show_name, ep.season, ep.episode)
                    }
                    SearchMode::SeasonPack => format!("{} S{:02}", show_name, ep.season),
                };
                seen.insert(query.clone()).then_some(query)
            })
            .collect()
    }

    fn result_kind(&self) -> ResultKind {
        match self.indexer.policy.provider_type {
            ProviderType::Nzb => ResultKind::Nzb,
            ProviderType::Torrent => ResultKind::torrent(),
        }
    }

    async fn run_query(&self, query: &str) -> Result<Vec<JackettResult>, ProviderError> {
        self.limiter.try_acquire()?;

        let start = Instant::now();
        debug!(indexer = %self.indexer.id, query = %query, "Searching Jackett");
        let response = self.client.get(self.build_search_url(query)).send().await;
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                self.record_request("error", start);
                return Err(e.into());
            }
        };
        self.check_status(&response)?;

        let body: JackettResponse = response.json().await.map_err(|e| {
            self.record_request("error", start);
            ProviderError::Api(format!("Failed to parse response: {}", e))
        })?;
        self.record_request("success", start);

        debug!(
            indexer = %self.indexer.id,
            results = body.results.len(),
            "Jackett search complete"
        );
        Ok(body.results)
    }

    fn record_request(&self, status: &str, start: Instant) {
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["jackett", "search", status])
            .inc();
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["jackett", "search"])
            .observe(start.elapsed().as_secs_f64());
    }

    fn check_status(&self, response: &reqwest::Response) -> Result<(), ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::Auth(format!(
                "HTTP {} from indexer {}",
                status, self.indexer.id
            ))),
            StatusCode::TOO_MANY_REQUESTS => {
                let cooldown = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_COOLDOWN);
                self.limiter.block_for(cooldown);
                warn!(indexer = %self.indexer.id, cooldown_secs = cooldown.as_secs(), "Indexer rate limited us");
                Err(ProviderError::RateLimited {
                    provider: self.indexer.id.clone(),
                    retry_after_ms: cooldown.as_millis() as u64,
                })
            }
            _ => Err(ProviderError::Api(format!("HTTP {}", status))),
        }
    }

    fn to_release(&self, result: JackettResult) -> Option<Release> {
        let url = result.magnet_uri.or(result.link)?;
        let mut release = Release::new(result.title, url, self.result_kind());
        if let Some(size) = result.size.filter(|s| *s > 0) {
            release = release.with_size(size as u64);
        }
        Some(release)
    }
}

#[async_trait]
impl Provider for JackettProvider {
    fn id(&self) -> &str {
        &self.indexer.id
    }

    fn name(&self) -> &str {
        self.indexer.name.as_deref().unwrap_or(&self.indexer.id)
    }

    fn policy(&self) -> &ProviderPolicy {
        &self.indexer.policy
    }

    fn should_skip(&self) -> bool {
        self.limiter.is_exhausted()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<Release>, ProviderError> {
        let mut releases = Vec::new();
        let mut seen_urls = HashSet::new();

        for query in Self::build_queries(request) {
            let results = self.run_query(&query).await?;
            for result in results {
                if let Some(release) = self.to_release(result) {
                    if seen_urls.insert(release.url.clone()) {
                        releases.push(release.for_show(request.show.id));
                    }
                }
            }
        }
        Ok(releases)
    }

    async fn search_recent(
        &self,
        episodes: &[(Show, WantedEpisode)],
    ) -> Result<Vec<Release>, ProviderError> {
        let mut shows: Vec<(String, u64)> = episodes
            .iter()
            .map(|(show, _)| (sanitize_scene_name(&show.name), show.id))
            .collect();
        shows.sort();
        shows.dedup();
        // Longest names first so "show name us" wins over "show name".
        shows.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let results = self.run_query("").await?;
        Ok(results
            .into_iter()
            .filter_map(|result| {
                let title = sanitize_scene_name(&result.title);
                let show_id = shows
                    .iter()
                    .find(|(name, _)| title.starts_with(&format!("{} ", name)))
                    .map(|(_, id)| *id)?;
                self.to_release(result).map(|r| r.for_show(show_id))
            })
            .collect())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.limiter.try_acquire()?;
        let response = self.client.get(url).send().await?;
        self.check_status(&response)?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::Api("Empty download".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

// Jackett API response types
#[derive(Debug, Deserialize)]
struct JackettResponse {
    #[serde(rename = "Results", default)]
    results: Vec<JackettResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JackettResult {
    title: String,
    magnet_uri: Option<String>,
    link: Option<String>,
    size: Option<i64>,
}
