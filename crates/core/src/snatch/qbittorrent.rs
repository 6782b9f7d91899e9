//! qBittorrent Web API v2 back-end.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::client::{DispatchError, DownloadClient};
use crate::config::QBittorrentConfig;
use crate::result::SearchResult;

/// Adds magnets and `.torrent` payloads to a qBittorrent instance.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set once the cookie jar holds a session; cleared on 403.
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()
            .map_err(|e| DispatchError::Api(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(false)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn login(&self) -> Result<(), DispatchError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status == StatusCode::FORBIDDEN {
            Err(DispatchError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DispatchError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), DispatchError> {
        if *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Multipart body for `torrents/add`. Rebuilt per attempt since a form
    /// is consumed by the request.
    fn add_form(&self, result: &SearchResult) -> Result<multipart::Form, DispatchError> {
        let mut form = if result.is_magnet() {
            multipart::Form::new().text("urls", result.url.clone())
        } else {
            let data = result
                .content()
                .ok_or_else(|| DispatchError::MissingPayload(result.name.clone()))?
                .to_vec();
            let file_name = format!("{}.torrent", sanitize_filename::sanitize(&result.name));
            let part = multipart::Part::bytes(data)
                .file_name(file_name)
                .mime_str("application/x-bittorrent")
                .map_err(|e| DispatchError::Api(e.to_string()))?;
            multipart::Form::new().part("torrents", part)
        };

        form = form.text("rename", result.name.clone());
        if let Some(ref category) = self.config.category {
            form = form.text("category", category.clone());
        }
        if let Some(ref path) = self.config.download_path {
            form = form.text("savepath", path.clone());
        }
        if self.config.paused {
            form = form.text("paused", "true");
        }
        if result.priority {
            form = form.text("addToTopOfQueue", "true");
        }
        Ok(form)
    }

    async fn post_add(&self, result: &SearchResult) -> Result<reqwest::Response, DispatchError> {
        let url = format!("{}/api/v2/torrents/add", self.base_url());
        Ok(self
            .client
            .post(&url)
            .multipart(self.add_form(result)?)
            .send()
            .await?)
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn send(&self, result: &SearchResult) -> Result<(), DispatchError> {
        self.ensure_authenticated().await?;

        let mut response = self.post_add(result).await?;
        if response.status() == StatusCode::FORBIDDEN {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;
            response = self.post_add(result).await?;
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DispatchError::Api(format!("HTTP {}: {}", status, body)));
        }
        if body.contains("Fails.") {
            return Err(DispatchError::Api(format!(
                "qBittorrent refused {}",
                result.name
            )));
        }

        info!(name = %result.name, magnet = result.is_magnet(), "Added torrent to qBittorrent");
        Ok(())
    }
}
