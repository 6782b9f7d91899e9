//! Clients for the release reputation services used by the scene check.
//!
//! Two independent lookups: a release database searched by exact name
//! (srrDB) and a pre database that reports pre times and nukes (predb.ovh).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::ReputationConfig;
use crate::naming::sanitize_scene_name;

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("Reputation service connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Reputation service API error: {0}")]
    ApiError(String),

    #[error("Reputation service request timeout")]
    Timeout,

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for ReputationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ReputationError::Timeout
        } else if e.is_connect() {
            ReputationError::ConnectionFailed(e.to_string())
        } else {
            ReputationError::ApiError(e.to_string())
        }
    }
}

/// Release database searched by exact release name.
#[async_trait]
pub trait ReleaseDatabase: Send + Sync {
    fn name(&self) -> &str;

    /// Newest listed release whose name matches `release`, if any.
    async fn find_release(&self, release: &str) -> Result<Option<String>, ReputationError>;
}

/// A nuke entry as reported by a pre database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NukeInfo {
    /// Nuke type, e.g. `nuke`, `modnuke`, `unnuke`, `delpre`, `undelpre`.
    pub kind: String,
    pub reason: Option<String>,
}

impl NukeInfo {
    /// Un-nukes and un-deletes mean the release is good again.
    pub fn is_active(&self) -> bool {
        !self.kind.to_ascii_lowercase().contains("un")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreRecord {
    pub name: String,
    /// Unix time of the pre, 0 when unknown.
    pub pre_at: i64,
    pub nuke: Option<NukeInfo>,
}

/// Pre database reporting pre times and nukes.
#[async_trait]
pub trait NukeDatabase: Send + Sync {
    fn name(&self) -> &str;

    /// Record for exactly this release, if listed.
    async fn find_pre(&self, release: &str) -> Result<Option<PreRecord>, ReputationError>;
}

fn build_client(timeout_secs: u64) -> Result<Client, ReputationError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReputationError::Client(e.to_string()))
}

/// srrDB search API client.
pub struct SrrDbClient {
    client: Client,
    base_url: String,
}

impl SrrDbClient {
    pub fn new(config: &ReputationConfig) -> Result<Self, ReputationError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.srrdb_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, release: &str) -> String {
        format!(
            "{}/search/r:{}/order:date-desc",
            self.base_url,
            urlencoding::encode(release)
        )
    }
}

#[async_trait]
impl ReleaseDatabase for SrrDbClient {
    fn name(&self) -> &str {
        "srrdb"
    }

    async fn find_release(&self, release: &str) -> Result<Option<String>, ReputationError> {
        let response = self.client.get(self.search_url(release)).send().await?;
        if !response.status().is_success() {
            return Err(ReputationError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: SrrDbResponse = response
            .json()
            .await
            .map_err(|e| ReputationError::ApiError(format!("Failed to parse response: {}", e)))?;
        debug!(release = %release, results = body.results.len(), "srrdb lookup complete");

        Ok(body
            .results
            .into_iter()
            .map(|r| r.release)
            .find(|r| r.eq_ignore_ascii_case(release)))
    }
}

#[derive(Debug, Deserialize)]
struct SrrDbResponse {
    #[serde(default)]
    results: Vec<SrrDbRelease>,
}

#[derive(Debug, Deserialize)]
struct SrrDbRelease {
    release: String,
}

/// predb.ovh API client.
pub struct PreDbClient {
    client: Client,
    base_url: String,
}

impl PreDbClient {
    pub fn new(config: &ReputationConfig) -> Result<Self, ReputationError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.predb_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, release: &str) -> String {
        let query = format!("@name \"{}\"", sanitize_scene_name(release));
        format!("{}/api/v1/?q={}", self.base_url, urlencoding::encode(&query))
    }
}

#[async_trait]
impl NukeDatabase for PreDbClient {
    fn name(&self) -> &str {
        "predb"
    }

    async fn find_pre(&self, release: &str) -> Result<Option<PreRecord>, ReputationError> {
        let response = self.client.get(self.search_url(release)).send().await?;
        if !response.status().is_success() {
            return Err(ReputationError::ApiError(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let body: PreDbResponse = response
            .json()
            .await
            .map_err(|e| ReputationError::ApiError(format!("Failed to parse response: {}", e)))?;
        if body.status != "success" {
            return Err(ReputationError::ApiError(format!(
                "status {}",
                body.status
            )));
        }

        Ok(body
            .data
            .map(|d| d.rows)
            .unwrap_or_default()
            .into_iter()
            .find(|row| row.name.eq_ignore_ascii_case(release))
            .map(|row| PreRecord {
                name: row.name,
                pre_at: row.pre_at.unwrap_or(0),
                nuke: row.nuke.map(|n| NukeInfo {
                    kind: n.kind,
                    reason: n.reason.filter(|r| !r.is_empty()),
                }),
            }))
    }
}

#[derive(Debug, Deserialize)]
struct PreDbResponse {
    status: String,
    data: Option<PreDbData>,
}

#[derive(Debug, Deserialize)]
struct PreDbData {
    #[serde(default)]
    rows: Vec<PreDbRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreDbRow {
    name: String,
    pre_at: Option<i64>,
    nuke: Option<PreDbNuke>,
}

#[derive(Debug, Deserialize)]
struct PreDbNuke {
    #[serde(rename = "type")]
    kind: String,
    reason: Option<String>,
}
