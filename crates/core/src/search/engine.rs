use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::reconcile::{Reconciled, Reconciler};
use super::worker::{run_worker, WorkerOutcome};
use crate::config::SearchConfig;
use crate::episode::{EpisodeRef, Show, WantedEpisode};
use crate::filter::SceneChecker;
use crate::history::History;
use crate::metrics;
use crate::naming::sanitize_scene_name;
use crate::provider::{Provider, ProviderType, SearchMode, SearchRequest};
use crate::quality::{wanted_qualities, PackedStatus, QualityProfile, Status};
use crate::ranking::{is_final_result, outranks, pick_best_result, PickContext};
use crate::result::SearchResult;
use crate::store::EpisodeStore;

/// Caller switches for a backlog pass.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Search triggered by a user; also revisits skipped and terminal episodes.
    pub manual: bool,
    pub torrent_only: bool,
    pub try_other_searches: bool,
    /// Status the episodes had before a failed download, if known.
    pub old_status: Option<PackedStatus>,
    /// Pass started by the backlog scheduler rather than a user.
    pub scheduled: bool,
}

/// Episode search engine.
///
/// Owns the provider list and the collaborators ranking needs; every entry
/// point reads configuration from the [`SearchConfig`] it was built with.
pub struct SearchEngine {
    config: Arc<SearchConfig>,
    providers: Vec<Arc<dyn Provider>>,
    store: Arc<dyn EpisodeStore>,
    history: Arc<dyn History>,
    scene: Option<Arc<SceneChecker>>,
}

impl SearchEngine {
    pub fn new(
        config: Arc<SearchConfig>,
        providers: Vec<Arc<dyn Provider>>,
        store: Arc<dyn EpisodeStore>,
        history: Arc<dyn History>,
    ) -> Self {
        Self {
            config,
            providers,
            store,
            history,
            scene: None,
        }
    }

    /// Enable scene checks for providers whose policy asks for them.
    pub fn with_scene(mut self, scene: Arc<SceneChecker>) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    fn pick_context<'a>(&'a self, show: &'a Show) -> PickContext<'a> {
        PickContext {
            show,
            config: &self.config,
            history: self.history.as_ref(),
            scene: self.scene.as_deref(),
        }
    }

    /// Status used to decide between a first search and an upgrade search.
    fn old_status(&self, episode: &EpisodeRef, current: PackedStatus, opts: &SearchOptions) -> PackedStatus {
        if let Some(old) = opts.old_status {
            return old;
        }
        if current.status() == Status::Failed {
            match self.history.find_old_status(episode) {
                Ok(Some(old)) => return old,
                Ok(None) => {}
                Err(e) => warn!(episode = %episode, error = %e, "Failed to look up old status"),
            }
        }
        current
    }

    /// Requested episodes that still accept at least one quality.
    fn wanted_episodes(
        &self,
        show: &Show,
        episodes: &[EpisodeRef],
        opts: &SearchOptions,
    ) -> BTreeMap<EpisodeRef, WantedEpisode> {
        let mut wanted = BTreeMap::new();
        for episode in episodes {
            let record = match self.store.episode(episode) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(episode = %episode, "Episode not found");
                    continue;
                }
                Err(e) => {
                    warn!(episode = %episode, error = %e, "Failed to load episode");
                    continue;
                }
            };

            let (status, quality) = record.status.split();
            let mut qualities = wanted_qualities(&show.profile, status, quality, false, opts.manual);
            if self.old_status(episode, record.status, opts).status().is_held() {
                qualities.retain(|q| show.profile.best_qualities.contains(q));
            }

            if qualities.is_empty() {
                debug!(episode = %episode, status = %record.status, "Episode not wanted");
                continue;
            }
            wanted.insert(
                *episode,
                WantedEpisode {
                    episode: *episode,
                    status: record.status,
                    wanted: qualities,
                },
            );
        }
        wanted
    }

    fn dispatchable(&self, show: &Show, opts: &SearchOptions) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|provider| {
                let policy = provider.policy();
                provider.is_active()
                    && (!policy.anime_only || show.is_anime)
                    && policy.enable_backlog
                    && (!opts.scheduled || policy.enable_scheduled_backlog)
                    && (!opts.torrent_only || policy.provider_type == ProviderType::Torrent)
            })
            .cloned()
            .collect()
    }

    /// Search every eligible provider concurrently and pick at most one
    /// result per requested episode.
    ///
    /// A season pack every episode of its season wants ends the pass at once
    /// and is returned alone.
    pub async fn search_providers(
        &self,
        show: &Show,
        episodes: &[EpisodeRef],
        opts: &SearchOptions,
    ) -> Vec<SearchResult> {
        let wanted = self.wanted_episodes(show, episodes, opts);
        if wanted.is_empty() {
            info!(show = %show.name, "No wanted episodes to search for");
            return Vec::new();
        }

        let providers = self.dispatchable(show, opts);
        if providers.is_empty() {
            warn!(show = %show.name, "No providers available for this search");
            return Vec::new();
        }

        info!(
            show = %show.name,
            episodes = wanted.len(),
            providers = providers.len(),
            "Searching providers"
        );

        let request = SearchRequest {
            show: show.clone(),
            episodes: wanted.values().cloned().collect(),
            mode: SearchMode::Episode,
            manual: opts.manual,
            try_other_searches: opts.try_other_searches,
        };
        let outcomes = self.run_workers(providers, &request, &wanted).await;

        let reconciler = Reconciler {
            ctx: self.pick_context(show),
            store: self.store.as_ref(),
            config: &self.config,
            wanted: &wanted,
            manual: opts.manual,
        };

        let mut finals: Vec<SearchResult> = Vec::new();
        for outcome in outcomes {
            if outcome.results.is_empty() {
                continue;
            }
            let provider_id = outcome.provider.id().to_string();
            match reconciler.reconcile(outcome.results).await {
                Reconciled::WholeSeason(pack) => {
                    info!(name = %pack.name, provider = %provider_id, "Using season pack");
                    discard_all(finals).await;
                    return vec![pack];
                }
                Reconciled::Picks(picks) => {
                    for pick in picks {
                        if let Some(dropped) = merge(&mut finals, pick) {
                            discard_all(dropped).await;
                        }
                    }
                }
            }

            if all_final(&finals, &wanted, &show.profile) {
                info!(show = %show.name, "Every requested episode has a final result");
                break;
            }
        }

        finals.sort_by(|a, b| a.episodes.cmp(&b.episodes));
        finals
    }

    /// Fan out one worker per provider and wait for all of them.
    async fn run_workers(
        &self,
        providers: Vec<Arc<dyn Provider>>,
        request: &SearchRequest,
        wanted: &BTreeMap<EpisodeRef, WantedEpisode>,
    ) -> Vec<WorkerOutcome> {
        let timeout = self.config.provider_timeout();
        let words = &self.config.words;

        let workers = providers.into_iter().map(|provider| {
            let request = request.clone();
            async move {
                let id = provider.id().to_string();
                let start = Instant::now();
                let outcome =
                    tokio::time::timeout(timeout, run_worker(provider, request, words, wanted)).await;

                metrics::PROVIDER_SEARCH_DURATION
                    .with_label_values(&[&id])
                    .observe(start.elapsed().as_secs_f64());
                let label = match &outcome {
                    Err(_) => "timeout",
                    Ok(Err(_)) => "error",
                    Ok(Ok(o)) if o.results.is_empty() => "empty",
                    Ok(Ok(_)) => "results",
                };
                metrics::PROVIDER_SEARCHES.with_label_values(&[&id, label]).inc();

                match outcome {
                    Ok(Ok(outcome)) => Some(outcome),
                    Ok(Err(_)) => None,
                    Err(_) => {
                        warn!(
                            provider = %id,
                            timeout_secs = timeout.as_secs(),
                            "Provider search timed out"
                        );
                        None
                    }
                }
            }
        });

        join_all(workers).await.into_iter().flatten().collect()
    }

    /// Recent-search pass over providers one at a time.
    ///
    /// Keeps, per episode, the best result seen across providers. Paused
    /// shows are skipped.
    pub async fn search_for_needed_episodes(&self, episodes: &[EpisodeRef]) -> Vec<SearchResult> {
        let mut shows: BTreeMap<u64, Show> = BTreeMap::new();
        let mut wanted: BTreeMap<EpisodeRef, WantedEpisode> = BTreeMap::new();

        for episode in episodes {
            if !shows.contains_key(&episode.show_id) {
                match self.store.show(episode.show_id) {
                    Ok(Some(show)) => {
                        shows.insert(show.id, show);
                    }
                    Ok(None) => {
                        warn!(show_id = episode.show_id, "Show not found");
                        continue;
                    }
                    Err(e) => {
                        warn!(show_id = episode.show_id, error = %e, "Failed to load show");
                        continue;
                    }
                }
            }
            let Some(show) = shows.get(&episode.show_id) else {
                continue;
            };
            if show.paused {
                debug!(show = %show.name, "Skipping paused show");
                continue;
            }

            let record = match self.store.episode(episode) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(episode = %episode, error = %e, "Failed to load episode");
                    continue;
                }
            };
            let (status, quality) = record.status.split();
            let qualities = wanted_qualities(&show.profile, status, quality, false, false);
            if qualities.is_empty() {
                continue;
            }
            wanted.insert(
                *episode,
                WantedEpisode {
                    episode: *episode,
                    status: record.status,
                    wanted: qualities,
                },
            );
        }

        if wanted.is_empty() {
            return Vec::new();
        }

        let needed: Vec<(Show, WantedEpisode)> = wanted
            .values()
            .filter_map(|w| shows.get(&w.episode.show_id).map(|s| (s.clone(), w.clone())))
            .collect();

        let mut best: BTreeMap<EpisodeRef, SearchResult> = BTreeMap::new();
        let recent_providers = self
            .providers
            .iter()
            .filter(|p| p.is_active() && p.policy().enable_recent_search);

        for provider in recent_providers {
            if provider.should_skip() {
                info!(provider = %provider.id(), "Provider asked to be skipped");
                continue;
            }

            let releases = match provider.search_recent(&needed).await {
                Ok(releases) => releases,
                Err(e) => {
                    warn!(provider = %provider.id(), error = %e, "Recent search failed");
                    metrics::PROVIDER_SEARCHES
                        .with_label_values(&[provider.id(), "error"])
                        .inc();
                    continue;
                }
            };
            let outcome = if releases.is_empty() { "empty" } else { "results" };
            metrics::PROVIDER_SEARCHES
                .with_label_values(&[provider.id(), outcome])
                .inc();

            let mut by_episode: BTreeMap<EpisodeRef, Vec<SearchResult>> = BTreeMap::new();
            for release in releases {
                let Some(show_id) = release.show_id.or_else(|| match_show(&release.name, shows.values())) else {
                    continue;
                };
                let Some(result) = SearchResult::from_release(release, show_id, Arc::clone(provider)) else {
                    continue;
                };
                if result.season_pack.is_some() || result.episodes.len() != 1 {
                    continue;
                }
                let episode = result.episodes[0];
                if wanted.contains_key(&episode) {
                    by_episode.entry(episode).or_default().push(result);
                }
            }

            for (episode, candidates) in by_episode {
                let (Some(show), Some(w)) = (shows.get(&episode.show_id), wanted.get(&episode)) else {
                    continue;
                };
                let ctx = self.pick_context(show);
                let Some(winner) = pick_best_result(candidates, &ctx, Some(&w.wanted)).await else {
                    continue;
                };
                let replace = best.get(&episode).map_or(true, |current| outranks(&winner, current));
                if replace {
                    debug!(episode = %episode, name = %winner.name, provider = %provider.id(), "New best recent result");
                    best.insert(episode, winner);
                }
            }
        }

        best.into_values().collect()
    }
}

/// Show whose sanitized name prefixes the release name. Longest name wins.
fn match_show<'a>(release: &str, shows: impl Iterator<Item = &'a Show>) -> Option<u64> {
    let release = sanitize_scene_name(release);
    shows
        .filter(|show| {
            let name = sanitize_scene_name(&show.name);
            !name.is_empty() && release.starts_with(&format!("{} ", name))
        })
        .max_by_key(|show| show.name.len())
        .map(|show| show.id)
}

/// Add `candidate` to `finals` if it beats what it overlaps.
///
/// A single-episode result must be strictly higher quality than every result
/// it overlaps. A multi-episode result is taken when it covers an episode with
/// no result yet, or is higher quality than an overlapping result, as long as
/// nothing it displaces covers episodes outside it.
///
/// Returns whatever the candidate displaced, or the candidate itself when it
/// lost.
fn merge(finals: &mut Vec<SearchResult>, candidate: SearchResult) -> Option<Vec<SearchResult>> {
    let overlapping: Vec<usize> = finals
        .iter()
        .enumerate()
        .filter(|(_, r)| r.episodes.iter().any(|ep| candidate.covers(ep)))
        .map(|(i, _)| i)
        .collect();

    if overlapping.is_empty() {
        finals.push(candidate);
        return None;
    }

    let wins = if candidate.episodes.len() > 1 {
        let unsatisfied = candidate
            .episodes
            .iter()
            .any(|ep| !finals.iter().any(|r| r.covers(ep)));
        let improves = overlapping
            .iter()
            .any(|&i| finals[i].quality < candidate.quality);
        let uncovers = overlapping
            .iter()
            .any(|&i| finals[i].episodes.iter().any(|ep| !candidate.covers(ep)));
        (unsatisfied || improves) && !uncovers
    } else {
        overlapping.iter().all(|&i| candidate.quality > finals[i].quality)
    };

    if !wins {
        debug!(name = %candidate.name, "Keeping earlier provider's result");
        return Some(vec![candidate]);
    }

    let mut dropped = Vec::with_capacity(overlapping.len());
    for i in overlapping.into_iter().rev() {
        dropped.push(finals.remove(i));
    }
    debug!(name = %candidate.name, replaced = dropped.len(), "Replacing earlier results");
    finals.push(candidate);
    Some(dropped)
}

fn all_final(
    finals: &[SearchResult],
    wanted: &BTreeMap<EpisodeRef, WantedEpisode>,
    profile: &QualityProfile,
) -> bool {
    wanted.keys().all(|ep| {
        finals
            .iter()
            .any(|r| r.covers(ep) && is_final_result(r, profile))
    })
}

/// Remove cache files of results that will never be snatched.
async fn discard_all(results: Vec<SearchResult>) {
    for result in results {
        if let Some(path) = result.cache_file() {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "Failed to remove cached torrent");
            }
        }
    }
}
