//! One provider's share of a backlog pass.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::WordsConfig;
use crate::episode::{EpisodeRef, Show, WantedEpisode};
use crate::filter::passes_show_wordlist;
use crate::provider::{Provider, ProviderError, SearchRequest};
use crate::result::SearchResult;

/// A provider is searched at most this many times per pass.
const MAX_ATTEMPTS: usize = 2;

/// Results of one worker, owned by that worker until the join.
pub(crate) struct WorkerOutcome {
    pub provider: Arc<dyn Provider>,
    pub results: Vec<SearchResult>,
}

/// Search one provider in its configured mode, falling back to the other
/// mode once when allowed and the first attempt found nothing.
///
/// Authentication failures end the worker without a retry.
pub(crate) async fn run_worker(
    provider: Arc<dyn Provider>,
    request: SearchRequest,
    words: &WordsConfig,
    wanted: &BTreeMap<EpisodeRef, WantedEpisode>,
) -> Result<WorkerOutcome, ProviderError> {
    let policy = provider.policy();
    let mut mode = policy.search_mode;

    for attempt in 1..=MAX_ATTEMPTS {
        if provider.should_skip() {
            info!(provider = %provider.id(), "Provider asked to be skipped");
            break;
        }

        let can_retry = attempt < MAX_ATTEMPTS && policy.search_fallback;
        let attempt_request = SearchRequest {
            mode,
            ..request.clone()
        };

        match provider.search(&attempt_request).await {
            Ok(releases) => {
                let found = releases.len();
                let results: Vec<SearchResult> = releases
                    .into_iter()
                    .filter_map(|r| {
                        SearchResult::from_release(r, request.show.id, Arc::clone(&provider))
                    })
                    .filter(|r| keep(r, &request.show, words, wanted))
                    .collect();

                debug!(
                    provider = %provider.id(),
                    mode = ?mode,
                    found = found,
                    kept = results.len(),
                    "Provider search finished"
                );

                if !results.is_empty() || !can_retry {
                    return Ok(WorkerOutcome { provider, results });
                }
            }
            Err(e) if e.is_auth() => {
                warn!(provider = %provider.id(), error = %e, "Provider authentication failed");
                return Err(e);
            }
            Err(e) => {
                warn!(provider = %provider.id(), mode = ?mode, error = %e, "Provider search failed");
                if !can_retry {
                    return Err(e);
                }
            }
        }

        mode = mode.fallback();
        info!(provider = %provider.id(), mode = ?mode, "Falling back to other search mode");
    }

    Ok(WorkerOutcome {
        provider,
        results: Vec::new(),
    })
}

/// Strip noise: word-list failures, episodes nobody asked for, and
/// qualities none of the covered episodes still want.
fn keep(
    result: &SearchResult,
    show: &Show,
    words: &WordsConfig,
    wanted: &BTreeMap<EpisodeRef, WantedEpisode>,
) -> bool {
    if !passes_show_wordlist(&result.name, words, show) {
        return false;
    }

    if let Some(season) = result.season_pack {
        return wanted
            .values()
            .any(|w| w.episode.season == season && w.wants(result.quality));
    }

    let wanted_here = result
        .episodes
        .iter()
        .filter_map(|ep| wanted.get(ep))
        .any(|w| w.wants(result.quality));
    if !wanted_here {
        debug!(name = %result.name, quality = %result.quality, "Dropping unwanted result");
    }
    wanted_here
}
