//! Turns one provider's raw results into per-episode picks.
//!
//! Runs after the join barrier, so nothing here is shared with a worker.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use super::nzb_split::split_nzb;
use super::torrent::{embedded_name, write_cache};
use crate::config::SearchConfig;
use crate::episode::{EpisodeRef, Show, WantedEpisode};
use crate::filter::passes_show_wordlist;
use crate::metrics;
use crate::provider::ProviderType;
use crate::quality::{wanted_qualities, Quality};
use crate::ranking::{pick_best_index, pick_best_result, PickContext};
use crate::result::{ResultKind, SearchResult};
use crate::store::EpisodeStore;

pub(crate) enum Reconciled {
    /// A season pack every episode of the season wants. Ends the pass.
    WholeSeason(SearchResult),
    Picks(Vec<SearchResult>),
}

pub(crate) struct Reconciler<'a> {
    pub ctx: PickContext<'a>,
    pub store: &'a dyn EpisodeStore,
    pub config: &'a SearchConfig,
    pub wanted: &'a BTreeMap<EpisodeRef, WantedEpisode>,
    pub manual: bool,
}

impl Reconciler<'_> {
    fn show(&self) -> &Show {
        self.ctx.show
    }

    pub async fn reconcile(&self, results: Vec<SearchResult>) -> Reconciled {
        let highest = results.iter().map(|r| r.quality).max();

        let (packs, mut pool): (Vec<_>, Vec<_>) =
            results.into_iter().partition(|r| r.season_pack.is_some());

        let mut by_season: BTreeMap<u32, Vec<SearchResult>> = BTreeMap::new();
        for pack in packs {
            if let Some(season) = pack.season_pack {
                by_season.entry(season).or_default().push(pack);
            }
        }
        for (season, packs) in by_season {
            if let Some(whole) = self.season_pack(season, packs, highest, &mut pool).await {
                return Reconciled::WholeSeason(whole);
            }
        }

        let (multis, singles): (Vec<_>, Vec<_>) =
            pool.into_iter().partition(|r| r.is_multi_episode());

        let singles = self.pick_singles(singles).await;
        let multis = self.pick_multis(multis).await;
        let accepted = self.accept_multis(singles, multis);

        let mut picks = Vec::with_capacity(accepted.len());
        for result in accepted {
            if let Some(result) = self.materialize(result).await {
                picks.push(result);
            }
        }
        Reconciled::Picks(picks)
    }

    /// Qualities each episode of `season` would accept.
    ///
    /// Requested episodes use the pass's wanted list; the rest are computed
    /// from their stored status.
    fn season_wants(&self, season: u32) -> Vec<(EpisodeRef, Vec<Quality>)> {
        let show = self.show();
        let records = match self.store.season_episodes(show.id, season) {
            Ok(records) => records,
            Err(e) => {
                warn!(show = %show.name, season = season, error = %e, "Failed to load season episodes");
                Vec::new()
            }
        };

        if records.is_empty() {
            return self
                .wanted
                .values()
                .filter(|w| w.episode.season == season)
                .map(|w| (w.episode, w.wanted.clone()))
                .collect();
        }

        records
            .into_iter()
            .map(|record| {
                let qualities = match self.wanted.get(&record.episode) {
                    Some(w) => w.wanted.clone(),
                    None => {
                        let (status, quality) = record.status.split();
                        wanted_qualities(&show.profile, status, quality, false, self.manual)
                    }
                };
                (record.episode, qualities)
            })
            .collect()
    }

    /// Decide what a season pack becomes. Returns the pack when it should be
    /// snatched as a whole; otherwise feeds its episodes into `pool`.
    async fn season_pack(
        &self,
        season: u32,
        packs: Vec<SearchResult>,
        highest: Option<Quality>,
        pool: &mut Vec<SearchResult>,
    ) -> Option<SearchResult> {
        let mut pack = pick_best_result(packs, &self.ctx, None).await?;
        let wants = self.season_wants(season);

        let wanted_eps: Vec<EpisodeRef> = wants
            .iter()
            .filter(|(_, qualities)| qualities.contains(&pack.quality))
            .map(|(ep, _)| *ep)
            .collect();
        let all_wanted = !wants.is_empty() && wanted_eps.len() == wants.len();

        if all_wanted && Some(pack.quality) == highest {
            info!(
                name = %pack.name,
                provider = %pack.provider_id(),
                season = season,
                "Every episode of the season wants this pack"
            );
            pack.episodes = wants.into_iter().map(|(ep, _)| ep).collect();
            return Some(pack);
        }

        if wanted_eps.is_empty() {
            debug!(name = %pack.name, "No episode in the season pack is wanted");
            return None;
        }

        match pack.provider.policy().provider_type {
            ProviderType::Nzb => {
                let parts = self.split_pack(pack, season).await;
                pool.extend(parts);
            }
            ProviderType::Torrent => {
                debug!(
                    name = %pack.name,
                    episodes = wanted_eps.len(),
                    "Keeping season pack as a multi-episode result"
                );
                pack.episodes = wanted_eps;
                pool.push(pack);
            }
        }
        None
    }

    /// Split an NZB season pack into per-episode results.
    async fn split_pack(&self, mut pack: SearchResult, season: u32) -> Vec<SearchResult> {
        if !pack.resolve_url().await {
            warn!(name = %pack.name, "Could not resolve season pack URL");
            return Vec::new();
        }
        let bytes = match pack.provider.download(&pack.url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(name = %pack.name, error = %e, "Failed to download season pack NZB");
                return Vec::new();
            }
        };
        let xml = String::from_utf8_lossy(&bytes);
        let parts = match split_nzb(&xml, season) {
            Ok(parts) => parts,
            Err(e) => {
                warn!(name = %pack.name, error = %e, "Failed to split season pack NZB");
                return Vec::new();
            }
        };

        let show = self.show();
        parts
            .into_iter()
            .filter(|part| passes_show_wordlist(&part.name, &self.config.words, show))
            .map(|part| {
                let episodes = part
                    .episodes
                    .iter()
                    .map(|&e| EpisodeRef::new(show.id, part.season, e))
                    .collect();
                pack.derived(part.name, ResultKind::NzbData { nzb: part.nzb }, episodes)
            })
            .collect()
    }

    /// Qualities any of `episodes` still accepts.
    fn allowed_for(&self, episodes: &[EpisodeRef]) -> Vec<Quality> {
        let mut allowed: Vec<Quality> = episodes
            .iter()
            .filter_map(|ep| self.wanted.get(ep))
            .flat_map(|w| w.wanted.iter().copied())
            .collect();
        allowed.sort();
        allowed.dedup();
        allowed
    }

    async fn pick_singles(&self, singles: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut by_episode: BTreeMap<EpisodeRef, Vec<SearchResult>> = BTreeMap::new();
        for result in singles {
            if let Some(ep) = result.episodes.first().copied() {
                by_episode.entry(ep).or_default().push(result);
            }
        }

        let mut picks = Vec::new();
        for (ep, candidates) in by_episode {
            let Some(wanted) = self.wanted.get(&ep) else {
                continue;
            };
            if let Some(best) = pick_best_result(candidates, &self.ctx, Some(&wanted.wanted)).await {
                debug!(episode = %ep, name = %best.name, "Picked episode result");
                picks.push(best);
            }
        }
        picks
    }

    async fn pick_multis(&self, multis: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut groups: BTreeMap<Vec<EpisodeRef>, Vec<SearchResult>> = BTreeMap::new();
        for result in multis {
            groups.entry(result.episodes.clone()).or_default().push(result);
        }

        let mut picks = Vec::new();
        for (episodes, candidates) in groups {
            let allowed = self.allowed_for(&episodes);
            if allowed.is_empty() {
                continue;
            }
            match pick_best_result(candidates, &self.ctx, Some(&allowed)).await {
                Some(best) => picks.push(best),
                None => debug!(episodes = ?episodes, "No multi-episode winner"),
            }
        }
        picks
    }

    /// Let multi-episode winners replace singles when they cover an
    /// otherwise unsatisfied episode or raise the quality of one they cover.
    fn accept_multis(&self, singles: Vec<SearchResult>, mut multis: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut accepted = singles;
        multis.sort_by(|a, b| b.quality.cmp(&a.quality));

        for multi in multis {
            let needed: Vec<EpisodeRef> = multi
                .episodes
                .iter()
                .filter(|ep| self.wanted.get(ep).is_some_and(|w| w.wants(multi.quality)))
                .copied()
                .collect();
            if needed.is_empty() {
                debug!(name = %multi.name, "Multi-episode result covers nothing wanted");
                continue;
            }

            let unsatisfied = needed
                .iter()
                .any(|ep| !accepted.iter().any(|r| r.covers(ep)));
            let improves = needed.iter().any(|ep| {
                accepted
                    .iter()
                    .any(|r| r.covers(ep) && r.quality < multi.quality)
            });
            if !unsatisfied && !improves {
                debug!(name = %multi.name, "Multi-episode result adds nothing");
                continue;
            }

            accepted.retain(|r| !r.episodes.iter().any(|ep| multi.covers(ep)));
            accepted.push(multi);
        }
        accepted
    }

    /// Resolve deferred URLs and validate torrent payloads.
    ///
    /// Returns `None` when the result has to be dropped.
    async fn materialize(&self, mut result: SearchResult) -> Option<SearchResult> {
        if !result.resolve_url().await {
            warn!(name = %result.name, provider = %result.provider_id(), "Deferred URL did not resolve");
            metrics::CANDIDATES_REJECTED.with_label_values(&["fetch"]).inc();
            return None;
        }
        result.run_after_fetch();

        if !result.is_torrent() || result.is_magnet() || result.content().is_some() {
            return Some(result);
        }

        let bytes = match result.provider.download(&result.url).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                warn!(name = %result.name, "Empty torrent payload");
                metrics::CANDIDATES_REJECTED.with_label_values(&["torrent"]).inc();
                return None;
            }
            Err(e) => {
                warn!(name = %result.name, error = %e, "Failed to download torrent");
                metrics::CANDIDATES_REJECTED.with_label_values(&["torrent"]).inc();
                return None;
            }
        };

        let cache_file = match write_cache(&self.config.cache_dir, &result.name, &bytes).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(name = %result.name, error = %e, "Failed to cache torrent");
                None
            }
        };

        let valid = match embedded_name(&bytes) {
            Ok(embedded) if embedded == result.name => true,
            Ok(embedded) => {
                let renamed = result.derived(embedded.clone(), ResultKind::torrent(), result.episodes.clone());
                let allowed = self.allowed_for(&result.episodes);
                let passes = pick_best_index(std::slice::from_ref(&renamed), &self.ctx, Some(&allowed))
                    .await
                    .is_some();
                if !passes {
                    info!(name = %result.name, embedded = %embedded, "Embedded torrent name rejected");
                }
                passes
            }
            Err(e) => {
                warn!(name = %result.name, error = %e, "Malformed torrent payload");
                false
            }
        };

        if !valid {
            metrics::CANDIDATES_REJECTED.with_label_values(&["torrent"]).inc();
            if let Some(path) = cache_file {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    debug!(path = %path.display(), error = %e, "Failed to remove cached torrent");
                }
            }
            return None;
        }

        result.set_content(Some(bytes));
        result.set_cache_file(cache_file);
        Some(result)
    }
}
