use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::blackhole::{NzbBlackhole, TorrentBlackhole};
use super::client::{DispatchError, DownloadClient};
use super::qbittorrent::QBittorrentClient;
use crate::config::{NzbMethod, SearchConfig, TorrentMethod};
use crate::episode::{EpisodeRef, Show};
use crate::events::{EventHandle, SearchEvent};
use crate::history::History;
use crate::metrics;
use crate::quality::{PackedStatus, Status};
use crate::ranking::is_first_best_match;
use crate::result::SearchResult;
use crate::store::{EpisodeStore, StatusChange, StoreError};

/// Episodes that aired this many days ago or later are sent with priority.
const PRIORITY_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum SnatchError {
    #[error("Result covers no episodes: {0}")]
    NoEpisodes(String),

    #[error("Deferred URL did not resolve for {0}")]
    UnresolvedUrl(String),

    #[error("No {0} download client configured")]
    NoClient(&'static str),

    #[error("Download client configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Hands winners to download back-ends and records the outcome.
pub struct Snatcher {
    config: Arc<SearchConfig>,
    store: Arc<dyn EpisodeStore>,
    history: Arc<dyn History>,
    nzb_client: Option<Arc<dyn DownloadClient>>,
    torrent_client: Option<Arc<dyn DownloadClient>>,
    events: Option<EventHandle>,
}

impl Snatcher {
    pub fn new(
        config: Arc<SearchConfig>,
        store: Arc<dyn EpisodeStore>,
        history: Arc<dyn History>,
        nzb_client: Option<Arc<dyn DownloadClient>>,
        torrent_client: Option<Arc<dyn DownloadClient>>,
    ) -> Self {
        Self {
            config,
            store,
            history,
            nzb_client,
            torrent_client,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the back-ends named by `config.download`.
    ///
    /// A blackhole without a directory leaves that result type without a
    /// client; qBittorrent without its section is an error.
    pub fn from_config(
        config: Arc<SearchConfig>,
        store: Arc<dyn EpisodeStore>,
        history: Arc<dyn History>,
    ) -> Result<Self, SnatchError> {
        let download = &config.download;

        let nzb_client: Option<Arc<dyn DownloadClient>> = match download.nzb_method {
            NzbMethod::Blackhole => download
                .nzb_dir
                .as_ref()
                .map(|dir| Arc::new(NzbBlackhole::new(dir)) as Arc<dyn DownloadClient>),
        };

        let torrent_client: Option<Arc<dyn DownloadClient>> = match download.torrent_method {
            TorrentMethod::Blackhole => download
                .torrent_dir
                .as_ref()
                .map(|dir| Arc::new(TorrentBlackhole::new(dir)) as Arc<dyn DownloadClient>),
            TorrentMethod::Qbittorrent => {
                let qb = config.qbittorrent.clone().ok_or_else(|| {
                    SnatchError::Config("torrent_method is qbittorrent but [qbittorrent] is missing".to_string())
                })?;
                Some(Arc::new(QBittorrentClient::new(qb)?))
            }
        };

        if nzb_client.is_none() {
            debug!("No NZB download client configured");
        }
        if torrent_client.is_none() {
            debug!("No torrent download client configured");
        }

        Ok(Self::new(config, store, history, nzb_client, torrent_client))
    }

    /// Dispatch `result` and mark its episodes snatched.
    ///
    /// Returns false when any dispatch step fails; episode statuses are then
    /// left untouched so the next pass searches again.
    pub async fn snatch(&self, result: &mut SearchResult) -> bool {
        let kind = result.kind.label();
        match self.try_snatch(result).await {
            Ok(changes) => {
                metrics::SNATCHES.with_label_values(&[kind, "success"]).inc();
                info!(
                    name = %result.name,
                    provider = %result.provider_id(),
                    quality = %result.quality,
                    episodes = changes.len(),
                    "Snatched release"
                );
                true
            }
            Err(e) => {
                metrics::SNATCHES.with_label_values(&[kind, "failure"]).inc();
                warn!(name = %result.name, provider = %result.provider_id(), error = %e, "Snatch failed");
                if let Some(ref events) = self.events {
                    events.try_emit(SearchEvent::SnatchFailed {
                        release: result.name.clone(),
                        provider: result.provider_id().to_string(),
                        reason: e.to_string(),
                    });
                }
                false
            }
        }
    }

    pub async fn try_snatch(
        &self,
        result: &mut SearchResult,
    ) -> Result<Vec<(EpisodeRef, StatusChange)>, SnatchError> {
        let Some(first) = result.episodes.first().copied() else {
            return Err(SnatchError::NoEpisodes(result.name.clone()));
        };
        let show = self
            .store
            .show(first.show_id)?
            .ok_or(StoreError::ShowNotFound(first.show_id))?;

        let targets = self.stored_episodes(result)?;
        result.priority = self.recently_aired(&result.episodes, Utc::now().date_naive());

        if !result.resolve_url().await {
            return Err(SnatchError::UnresolvedUrl(result.name.clone()));
        }
        result.run_after_fetch();

        let client = if result.is_torrent() {
            if !result.is_magnet() && result.content().is_none() {
                let bytes = result.provider.download(&result.url).await.map_err(DispatchError::from)?;
                if bytes.is_empty() {
                    return Err(DispatchError::MissingPayload(result.name.clone()).into());
                }
                result.set_content(Some(bytes));
            }
            self.torrent_client.as_ref().ok_or(SnatchError::NoClient("torrent"))?
        } else {
            self.nzb_client.as_ref().ok_or(SnatchError::NoClient("nzb"))?
        };

        client.send(result).await?;
        debug!(name = %result.name, client = %client.name(), "Download client accepted release");

        if let Some(path) = result.cache_file().cloned() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), error = %e, "Failed to remove cached torrent");
            }
            result.set_cache_file(None);
        }

        let changes = self.mark_snatched(&show, result, &targets)?;
        self.record(result, &changes).await;
        Ok(changes)
    }

    fn recently_aired(&self, episodes: &[EpisodeRef], today: NaiveDate) -> bool {
        let cutoff = today - Duration::days(PRIORITY_DAYS);
        episodes.iter().any(|ep| match self.store.episode(ep) {
            Ok(Some(record)) => record.airdate.is_some_and(|d| d >= cutoff),
            _ => false,
        })
    }

    /// Episodes of `result` the store knows, checked before anything is sent.
    fn stored_episodes(&self, result: &SearchResult) -> Result<Vec<EpisodeRef>, SnatchError> {
        let mut stored = Vec::with_capacity(result.episodes.len());
        for ep in &result.episodes {
            match self.store.episode(ep)? {
                Some(_) => stored.push(*ep),
                None => warn!(episode = %ep, name = %result.name, "Snatched episode is not in the store"),
            }
        }
        Ok(stored)
    }

    /// One store write for every episode, so a failure changes none of them.
    fn mark_snatched(
        &self,
        show: &Show,
        result: &SearchResult,
        episodes: &[EpisodeRef],
    ) -> Result<Vec<(EpisodeRef, StatusChange)>, SnatchError> {
        let changes = self.store.update_statuses(episodes, &mut |old| {
            let end = if is_first_best_match(old.status(), result, &show.profile) {
                Status::SnatchedBest
            } else if result.proper_level > 0 {
                Status::SnatchedProper
            } else {
                Status::Snatched
            };
            PackedStatus::compose(end, result.quality)
        })?;
        Ok(changes)
    }

    /// History and notification for a dispatched result. Failures here are
    /// logged only; the payload is already with the client.
    async fn record(&self, result: &SearchResult, changes: &[(EpisodeRef, StatusChange)]) {
        if self.config.use_failed_downloads {
            if let Err(e) = self.history.add_snatched(result, changes) {
                warn!(name = %result.name, error = %e, "Failed to record snatch in failed history");
            }
        }
        if let Err(e) = self.history.log_snatch(result, changes) {
            warn!(name = %result.name, error = %e, "Failed to write snatch history");
        }

        if let Some(ref events) = self.events {
            for (ep, change) in changes {
                events
                    .emit(SearchEvent::EpisodeSnatched {
                        episode: *ep,
                        release: result.name.clone(),
                        provider: result.provider_id().to_string(),
                        quality: result.quality,
                        status: change.new.status(),
                    })
                    .await;
            }
        }
    }
}
