//! Candidate releases.
//!
//! Providers hand back [`Release`]s; the engine completes them into
//! [`SearchResult`]s by filling anything the provider left out from the
//! release name.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::episode::EpisodeRef;
use crate::naming;
use crate::provider::Provider;
use crate::quality::Quality;

/// Resolves a deferred download URL. Consumed at most once.
pub type FetchFn = Box<dyn FnOnce(String) -> BoxFuture<'static, Option<String>> + Send + Sync>;

/// Runs after the deferred URL is resolved. Consumed at most once.
pub type AfterFetchFn = Box<dyn FnOnce(&SearchResult) + Send + Sync>;

/// Payload shape of a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultKind {
    /// NZB fetched from the result URL.
    Nzb,
    /// NZB document already in hand, e.g. one episode split out of a season pack.
    NzbData { nzb: String },
    Torrent {
        content: Option<Vec<u8>>,
        cache_file: Option<PathBuf>,
    },
}

impl ResultKind {
    pub fn torrent() -> Self {
        ResultKind::Torrent {
            content: None,
            cache_file: None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResultKind::Nzb => "nzb",
            ResultKind::NzbData { .. } => "nzbdata",
            ResultKind::Torrent { .. } => "torrent",
        }
    }
}

/// What a release covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage {
    /// Derive from the release name.
    FromName,
    Episodes(Vec<EpisodeRef>),
    Season(u32),
}

/// A raw release as returned by a provider.
pub struct Release {
    pub name: String,
    pub url: String,
    pub size: Option<u64>,
    pub quality: Option<Quality>,
    pub kind: ResultKind,
    pub coverage: Coverage,
    /// Show the provider matched this release to, if it knows.
    pub show_id: Option<u64>,
    pub fetch: Option<FetchFn>,
    pub after_fetch: Option<AfterFetchFn>,
}

impl Release {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: ResultKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            size: None,
            quality: None,
            kind,
            coverage: Coverage::FromName,
            show_id: None,
            fetch: None,
            after_fetch: None,
        }
    }

    pub fn for_show(mut self, show_id: u64) -> Self {
        self.show_id = Some(show_id);
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

    pub fn covering(mut self, coverage: Coverage) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchFn) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub fn with_after_fetch(mut self, after: AfterFetchFn) -> Self {
        self.after_fetch = Some(after);
        self
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("kind", &self.kind.label())
            .field("coverage", &self.coverage)
            .finish()
    }
}

/// A candidate release for one or more episodes, created fresh every pass.
pub struct SearchResult {
    pub name: String,
    pub url: String,
    pub provider: Arc<dyn Provider>,
    pub quality: Quality,
    pub proper_level: u32,
    pub is_repack: bool,
    pub release_group: String,
    pub size: Option<u64>,
    pub kind: ResultKind,
    /// Sorted, never empty for anything that reaches a snatch.
    pub episodes: Vec<EpisodeRef>,
    /// Season number when the release bundles a whole season.
    pub season_pack: Option<u32>,
    /// Hint for download clients, set for recently aired episodes.
    pub priority: bool,
    fetch: Option<FetchFn>,
    after_fetch: Option<AfterFetchFn>,
}

impl SearchResult {
    /// Complete a provider release for `show_id`.
    ///
    /// Returns `None` when the name names no episode or season at all.
    pub fn from_release(release: Release, show_id: u64, provider: Arc<dyn Provider>) -> Option<Self> {
        let parsed = naming::parse_release(&release.name);
        let (mut episodes, season_pack) = match release.coverage {
            Coverage::Episodes(episodes) => (episodes, None),
            Coverage::Season(season) => (Vec::new(), Some(season)),
            Coverage::FromName if parsed.is_season_pack => (Vec::new(), parsed.season),
            Coverage::FromName => {
                let season = parsed.season?;
                (
                    parsed
                        .episodes
                        .iter()
                        .map(|&e| EpisodeRef::new(show_id, season, e))
                        .collect(),
                    None,
                )
            }
        };
        if episodes.is_empty() && season_pack.is_none() {
            return None;
        }
        episodes.sort();
        episodes.dedup();

        Some(Self {
            quality: release.quality.unwrap_or(parsed.quality),
            proper_level: parsed.proper_level,
            is_repack: parsed.is_repack,
            release_group: parsed.release_group,
            name: release.name,
            url: release.url,
            provider,
            size: release.size,
            kind: release.kind,
            episodes,
            season_pack,
            priority: false,
            fetch: release.fetch,
            after_fetch: release.after_fetch,
        })
    }

    /// Build a result that covers a fixed set of episodes, e.g. one split out of a pack.
    pub fn derived(&self, name: String, kind: ResultKind, episodes: Vec<EpisodeRef>) -> Self {
        let parsed = naming::parse_release(&name);
        Self {
            quality: self.quality,
            proper_level: parsed.proper_level.max(self.proper_level),
            is_repack: parsed.is_repack || self.is_repack,
            release_group: self.release_group.clone(),
            name,
            url: self.url.clone(),
            provider: Arc::clone(&self.provider),
            size: None,
            kind,
            episodes,
            season_pack: None,
            priority: false,
            fetch: None,
            after_fetch: None,
        }
    }

    pub fn provider_id(&self) -> &str {
        self.provider.id()
    }

    pub fn is_multi_episode(&self) -> bool {
        self.episodes.len() > 1
    }

    pub fn is_torrent(&self) -> bool {
        matches!(self.kind, ResultKind::Torrent { .. })
    }

    pub fn is_magnet(&self) -> bool {
        self.url.starts_with("magnet:")
    }

    pub fn covers(&self, episode: &EpisodeRef) -> bool {
        self.episodes.contains(episode)
    }

    pub fn has_fetch(&self) -> bool {
        self.fetch.is_some()
    }

    /// Run the deferred URL resolver if there is one.
    ///
    /// Returns false when the resolver produced no URL. The resolver is gone
    /// afterwards either way.
    pub async fn resolve_url(&mut self) -> bool {
        let Some(fetch) = self.fetch.take() else {
            return true;
        };
        match fetch(self.url.clone()).await {
            Some(url) if !url.is_empty() => {
                self.url = url;
                true
            }
            _ => false,
        }
    }

    /// Run the post-fetch hook if there is one.
    pub fn run_after_fetch(&mut self) {
        if let Some(after) = self.after_fetch.take() {
            after(self);
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match &self.kind {
            ResultKind::Torrent {
                content: Some(bytes),
                ..
            } => Some(bytes),
            _ => None,
        }
    }

    pub fn set_content(&mut self, bytes: Option<Vec<u8>>) {
        if let ResultKind::Torrent { content, .. } = &mut self.kind {
            *content = bytes;
        }
    }

    pub fn cache_file(&self) -> Option<&PathBuf> {
        match &self.kind {
            ResultKind::Torrent { cache_file, .. } => cache_file.as_ref(),
            _ => None,
        }
    }

    pub fn set_cache_file(&mut self, path: Option<PathBuf>) {
        if let ResultKind::Torrent { cache_file, .. } = &mut self.kind {
            *cache_file = path;
        }
    }
}

impl fmt::Debug for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchResult")
            .field("name", &self.name)
            .field("provider", &self.provider.id())
            .field("quality", &self.quality)
            .field("proper_level", &self.proper_level)
            .field("kind", &self.kind.label())
            .field("episodes", &self.episodes)
            .field("season_pack", &self.season_pack)
            .finish()
    }
}
