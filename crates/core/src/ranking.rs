//! Candidate ranking.
//!
//! [`best_candidate`] is the pairwise comparator; [`pick_best_result`] runs
//! the rejection checks over a candidate list and ranks the survivors. Only the
//! list-level pick can tell whether a repack replaces a release of its own group.

use std::cmp::Reverse;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::episode::Show;
use crate::filter::{passes_show_wordlist, SceneChecker, SceneGate};
use crate::history::History;
use crate::metrics;
use crate::quality::{Quality, QualityProfile, Status};
use crate::result::SearchResult;

static XVID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)xvid").unwrap());
static HEVC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:h.?|x)265|hevc").unwrap());
static INTERNAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[\W_])internal(?:$|[\W_])").unwrap());

/// xvid < everything else (x264 included) < x265/hevc.
fn codec_tier(name: &str) -> u8 {
    if HEVC_RE.is_match(name) {
        2
    } else if XVID_RE.is_match(name) {
        0
    } else {
        1
    }
}

/// Ranking attributes of one candidate, compared field by field. Higher wins.
///
/// Fields depend only on the candidate and its stray-repack flag, so the
/// ordering is total and a fold over any permutation lands on the same winner.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Rank<'a> {
    quality: Quality,
    proper_level: u32,
    codec: u8,
    not_internal: bool,
    not_stray_repack: bool,
    name: Reverse<&'a str>,
    size: Option<u64>,
    provider: Reverse<&'a str>,
}

/// `stray_repack` marks a repack whose group has nothing else in the pool to
/// repack. Its markers then give it no proper level.
fn rank(result: &SearchResult, stray_repack: bool) -> Rank<'_> {
    Rank {
        quality: result.quality,
        proper_level: if stray_repack { 0 } else { result.proper_level },
        codec: codec_tier(&result.name),
        not_internal: !INTERNAL_RE.is_match(&result.name),
        not_stray_repack: !stray_repack,
        name: Reverse(result.name.as_str()),
        size: result.size,
        provider: Reverse(result.provider_id()),
    }
}

/// Repacks in `pool` with no other candidate of the same quality from the same group.
fn stray_repacks(candidates: &[SearchResult], pool: &[usize]) -> Vec<bool> {
    let mut stray = vec![false; candidates.len()];
    for &idx in pool {
        let candidate = &candidates[idx];
        if !candidate.is_repack {
            continue;
        }
        stray[idx] = !pool.iter().any(|&other| {
            other != idx
                && candidates[other].quality == candidate.quality
                && candidates[other].release_group == candidate.release_group
        });
    }
    stray
}

/// True when `cur` should replace `best`.
///
/// Quality first, then proper level, then codec (xvid < x264 < x265), then
/// non-internal releases. Remaining ties go to the smaller name and then the
/// larger size, so only identical candidates compare equal.
pub fn outranks(cur: &SearchResult, best: &SearchResult) -> bool {
    rank(cur, false) > rank(best, false)
}

/// Pick between the current best and a new candidate. Ties keep `best`.
pub fn best_candidate<'a>(best: Option<&'a SearchResult>, cur: &'a SearchResult) -> &'a SearchResult {
    match best {
        None => cur,
        Some(best) if outranks(cur, best) => {
            debug!(
                name = %cur.name,
                replaced = %best.name,
                quality = %cur.quality,
                "Preferring candidate"
            );
            cur
        }
        Some(best) => best,
    }
}

/// True when nothing better than `result` could still be wanted under `profile`.
pub fn is_final_result(result: &SearchResult, profile: &QualityProfile) -> bool {
    if profile.best_qualities.iter().any(|q| *q > result.quality) {
        return false;
    }
    if profile.any_qualities.contains(&result.quality) {
        return true;
    }
    profile.max_best() == Some(result.quality)
        && !profile.any_qualities.iter().any(|q| *q > result.quality)
}

/// True when snatching `result` is the first best-tier match under upgrade-once.
///
/// The snatch then ends in [`Status::SnatchedBest`] and the episode is no
/// longer searched.
pub fn is_first_best_match(cur_status: Status, result: &SearchResult, profile: &QualityProfile) -> bool {
    if !profile.upgrade_once || !profile.best_qualities.contains(&result.quality) {
        return false;
    }
    let already_have = matches!(
        cur_status,
        Status::Snatched | Status::SnatchedProper | Status::SnatchedBest | Status::Downloaded
    );
    already_have || !profile.any_qualities.contains(&result.quality)
}

/// Everything the rejection checks read.
pub struct PickContext<'a> {
    pub show: &'a Show,
    pub config: &'a SearchConfig,
    pub history: &'a dyn History,
    /// Scene checks are skipped when absent.
    pub scene: Option<&'a SceneChecker>,
}

fn reject(candidate: &SearchResult, reason: &'static str) {
    metrics::CANDIDATES_REJECTED.with_label_values(&[reason]).inc();
    debug!(
        name = %candidate.name,
        provider = %candidate.provider_id(),
        reason = reason,
        "Rejected candidate"
    );
}

/// Index of the winning candidate, if any survives.
///
/// Candidates are rejected, in order, on release group (anime only),
/// quality outside `allowed`, word lists, failed-download history and the
/// provider's scene flags. Scene fallbacks are ranked only when no strict
/// candidate survives.
pub async fn pick_best_index(
    candidates: &[SearchResult],
    ctx: &PickContext<'_>,
    allowed: Option<&[Quality]>,
) -> Option<usize> {
    let mut strict: Vec<usize> = Vec::new();
    let mut fallback: Vec<usize> = Vec::new();

    for (idx, candidate) in candidates.iter().enumerate() {
        if ctx.show.is_anime && !ctx.show.release_groups.is_valid(&candidate.release_group) {
            reject(candidate, "release_group");
            continue;
        }

        if let Some(allowed) = allowed {
            if !allowed.contains(&candidate.quality) {
                reject(candidate, "quality");
                continue;
            }
        }

        if !passes_show_wordlist(&candidate.name, &ctx.config.words, ctx.show) {
            reject(candidate, "wordlist");
            continue;
        }

        if ctx.config.use_failed_downloads {
            match ctx
                .history
                .has_failed(&candidate.name, candidate.size, candidate.provider_id())
            {
                Ok(true) => {
                    info!(name = %candidate.name, "Skipping previously failed download");
                    reject(candidate, "failed");
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(name = %candidate.name, error = %e, "Failed-download lookup failed");
                }
            }
        }

        let policy = candidate.provider.policy();
        if policy.filters_scene() && !ctx.show.is_anime {
            if let Some(scene) = ctx.scene {
                match scene.gate(&candidate.name, policy).await {
                    SceneGate::Accept => {}
                    SceneGate::Fallback => {
                        fallback.push(idx);
                        continue;
                    }
                    SceneGate::Reject => {
                        reject(candidate, "scene");
                        continue;
                    }
                }
            }
        }

        strict.push(idx);
    }

    let pool = if strict.is_empty() { &fallback } else { &strict };
    let stray = stray_repacks(candidates, pool);
    let best = pool
        .iter()
        .copied()
        .max_by(|&a, &b| rank(&candidates[a], stray[a]).cmp(&rank(&candidates[b], stray[b])));

    if let Some(idx) = best {
        if strict.is_empty() {
            info!(name = %candidates[idx].name, "Using scene fallback candidate");
        }
    }
    best
}

/// Remove and return the winning candidate.
pub async fn pick_best_result(
    mut candidates: Vec<SearchResult>,
    ctx: &PickContext<'_>,
    allowed: Option<&[Quality]>,
) -> Option<SearchResult> {
    let idx = pick_best_index(&candidates, ctx, allowed).await?;
    Some(candidates.swap_remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::WordList;
    use crate::history::SqliteHistory;
    use crate::provider::{Provider, ProviderPolicy};
    use crate::testing::fixtures;
    use crate::testing::{MockNukeDb, MockProvider, MockReleaseDb};
    use std::sync::Arc;

    fn ctx<'a>(show: &'a Show, config: &'a SearchConfig, history: &'a SqliteHistory) -> PickContext<'a> {
        PickContext {
            show,
            config,
            history,
            scene: None,
        }
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for rest in permutations(n - 1) {
            for pos in 0..=rest.len() {
                let mut p = rest.clone();
                p.insert(pos, n - 1);
                out.push(p);
            }
        }
        out
    }

    #[test]
    fn test_higher_quality_wins() {
        let hdtv = fixtures::result("Show.S01E01.720p.HDTV.x264-GRP", Quality::Hdtv);
        let web = fixtures::result("Show.S01E01.720p.WEB-DL.x264-GRP", Quality::HdWebDl);
        assert_eq!(best_candidate(Some(&hdtv), &web).name, web.name);
        assert_eq!(best_candidate(Some(&web), &hdtv).name, web.name);
        assert_eq!(best_candidate(None, &hdtv).name, hdtv.name);
    }

    #[test]
    fn test_unknown_quality_never_wins_on_quality() {
        let known = fixtures::result("Show.S01E01.HDTV-GRP", Quality::Sdtv);
        let unknown = fixtures::result("Show.S01E01-GRP", Quality::Unknown);
        assert_eq!(best_candidate(Some(&known), &unknown).name, known.name);
    }

    #[test]
    fn test_repack_same_group_wins() {
        let plain = fixtures::result("Show.S01E01.x264-GRP", Quality::Hdtv);
        let repack = fixtures::result("Show.S01E01.REPACK.x264-GRP", Quality::Hdtv);
        assert_eq!(repack.proper_level, 1);
        assert_eq!(best_candidate(Some(&plain), &repack).name, repack.name);
        assert_eq!(best_candidate(Some(&repack), &plain).name, repack.name);
    }

    #[tokio::test]
    async fn test_repack_of_other_group_does_not_win_on_proper_level() {
        let show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv], vec![]));
        let config = SearchConfig::default();
        let history = SqliteHistory::in_memory().unwrap();

        for flip in [false, true] {
            let mut candidates = vec![
                fixtures::result("Show.S01E01.x264-GRP", Quality::Hdtv),
                fixtures::result("Show.S01E01.REPACK.x264-OTHER", Quality::Hdtv),
            ];
            if flip {
                candidates.reverse();
            }
            let winner = pick_best_result(candidates, &ctx(&show, &config, &history), None)
                .await
                .unwrap();
            assert_eq!(winner.name, "Show.S01E01.x264-GRP");
        }
    }

    #[tokio::test]
    async fn test_pick_is_order_independent_with_mixed_group_repacks() {
        let show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv], vec![]));
        let config = SearchConfig::default();
        let history = SqliteHistory::in_memory().unwrap();
        let names = [
            "Show.S01E01.REPACK.XviD-X",
            "Show.S01E01.x264-Y",
            "Show.S01E01.x265-X",
            "Show.S01E01.REPACK.x264-Z",
        ];

        for order in permutations(names.len()) {
            let candidates: Vec<SearchResult> = order
                .iter()
                .map(|&i| fixtures::result(names[i], Quality::Hdtv))
                .collect();
            let winner = pick_best_result(candidates, &ctx(&show, &config, &history), None)
                .await
                .unwrap();
            assert_eq!(winner.name, "Show.S01E01.REPACK.XviD-X", "order {:?}", order);
        }
    }

    #[test]
    fn test_proper_of_other_group_wins() {
        let plain = fixtures::result("Show.S01E01.x264-GRP", Quality::Hdtv);
        let proper = fixtures::result("Show.S01E01.PROPER.x264-OTHER", Quality::Hdtv);
        assert_eq!(best_candidate(Some(&plain), &proper).name, proper.name);
    }

    #[test]
    fn test_textual_tie_breaks() {
        let xvid = fixtures::result("Show.S01E01.HDTV.XviD-GRP", Quality::Hdtv);
        let x264 = fixtures::result("Show.S01E01.HDTV.x264-GRP", Quality::Hdtv);
        let hevc = fixtures::result("Show.S01E01.HDTV.HEVC-GRP", Quality::Hdtv);
        let internal = fixtures::result("Show.S01E01.INTERNAL.HDTV.HEVC-GRP", Quality::Hdtv);

        assert_eq!(best_candidate(Some(&xvid), &x264).name, x264.name);
        assert_eq!(best_candidate(Some(&x264), &hevc).name, hevc.name);
        assert_eq!(best_candidate(Some(&hevc), &internal).name, hevc.name);
        assert_eq!(best_candidate(Some(&internal), &hevc).name, hevc.name);
    }

    fn fold_winners(candidates: &[SearchResult]) -> Vec<String> {
        let mut winners: Vec<String> = permutations(candidates.len())
            .into_iter()
            .map(|order| {
                let mut best: Option<&SearchResult> = None;
                for idx in order {
                    best = Some(best_candidate(best, &candidates[idx]));
                }
                best.unwrap().name.clone()
            })
            .collect();
        winners.dedup();
        winners
    }

    fn results(names: &[(&str, Quality)]) -> Vec<SearchResult> {
        names.iter().map(|(n, q)| fixtures::result(n, *q)).collect()
    }

    #[test]
    fn test_fold_is_order_independent() {
        let candidates = results(&[
            ("Show.S01E01.HDTV.XviD-GRP", Quality::Hdtv),
            ("Show.S01E01.720p.HDTV.x264-GRP", Quality::Hdtv),
            ("Show.S01E01.720p.WEB-DL.x264-GRP", Quality::HdWebDl),
            ("Show.S01E01.PROPER.720p.WEB-DL.x264-GRP", Quality::HdWebDl),
            ("Show.S01E01.INTERNAL.720p.WEB-DL.x265-GRP", Quality::HdWebDl),
        ]);
        assert_eq!(permutations(candidates.len()).len(), 120);
        assert_eq!(fold_winners(&candidates), vec!["Show.S01E01.PROPER.720p.WEB-DL.x264-GRP"]);
    }

    #[test]
    fn test_fold_is_order_independent_for_mixed_group_repacks() {
        let two = results(&[
            ("Show.S01E01.x264-GRP", Quality::Hdtv),
            ("Show.S01E01.REPACK.x264-OTHER", Quality::Hdtv),
        ]);
        assert_eq!(fold_winners(&two).len(), 1);

        let cycle = results(&[
            ("Show.S01E01.REPACK.XviD-X", Quality::Hdtv),
            ("Show.S01E01.x264-Y", Quality::Hdtv),
            ("Show.S01E01.x265-X", Quality::Hdtv),
        ]);
        assert_eq!(fold_winners(&cycle), vec!["Show.S01E01.REPACK.XviD-X"]);
    }

    #[test]
    fn test_fold_is_order_independent_on_full_ties() {
        let ties = results(&[
            ("Show.S01E01.720p.HDTV.x264-CCC", Quality::Hdtv),
            ("Show.S01E01.720p.HDTV.x264-AAA", Quality::Hdtv),
            ("Show.S01E01.720p.HDTV.x264-BBB", Quality::Hdtv),
            ("Show.S01E01.720p.HDTV.h264-AAA", Quality::Hdtv),
        ]);
        assert_eq!(fold_winners(&ties), vec!["Show.S01E01.720p.HDTV.h264-AAA"]);

        let a = fixtures::result("Show.S01E01.720p.HDTV.x264-AAA", Quality::Hdtv);
        let b = fixtures::result("Show.S01E01.720p.HDTV.x264-BBB", Quality::Hdtv);
        assert!(outranks(&a, &b));
        assert!(!outranks(&b, &a));
        assert!(!outranks(&a, &a));
    }

    #[test]
    fn test_is_final_result() {
        let profile = QualityProfile::new(
            vec![Quality::Hdtv],
            vec![Quality::HdWebDl, Quality::FullHdWebDl],
        );
        let hdtv = fixtures::result("Show.S01E01.720p.HDTV-GRP", Quality::Hdtv);
        let web = fixtures::result("Show.S01E01.720p.WEB-DL-GRP", Quality::HdWebDl);
        let full = fixtures::result("Show.S01E01.1080p.WEB-DL-GRP", Quality::FullHdWebDl);

        assert!(!is_final_result(&hdtv, &profile));
        assert!(!is_final_result(&web, &profile));
        assert!(is_final_result(&full, &profile));

        let any_only = QualityProfile::new(vec![Quality::Hdtv], vec![]);
        assert!(is_final_result(&hdtv, &any_only));
        assert!(!is_final_result(&web, &any_only));
    }

    #[test]
    fn test_is_first_best_match() {
        let profile = QualityProfile::new(vec![Quality::Hdtv], vec![Quality::HdWebDl])
            .with_upgrade_once(true);
        let web = fixtures::result("Show.S01E01.720p.WEB-DL-GRP", Quality::HdWebDl);
        let hdtv = fixtures::result("Show.S01E01.720p.HDTV-GRP", Quality::Hdtv);

        assert!(is_first_best_match(Status::Wanted, &web, &profile));
        assert!(is_first_best_match(Status::Downloaded, &web, &profile));
        assert!(!is_first_best_match(Status::Wanted, &hdtv, &profile));
        assert!(!is_first_best_match(
            Status::Wanted,
            &web,
            &profile.clone().with_upgrade_once(false)
        ));

        // Best quality that is also an any quality only counts once something is held.
        let overlap = QualityProfile::new(vec![Quality::HdWebDl], vec![Quality::HdWebDl])
            .with_upgrade_once(true);
        assert!(!is_first_best_match(Status::Wanted, &web, &overlap));
        assert!(is_first_best_match(Status::Snatched, &web, &overlap));
    }

    #[tokio::test]
    async fn test_pick_rejects_by_quality_and_wordlist() {
        let show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv, Quality::HdWebDl], vec![]));
        let config = SearchConfig {
            words: crate::config::WordsConfig {
                ignore: WordList::parse("german"),
                require: WordList::default(),
            },
            ..SearchConfig::default()
        };
        let history = SqliteHistory::in_memory().unwrap();

        let candidates = vec![
            fixtures::result("Show.S01E01.1080p.BluRay-GRP", Quality::FullHdBluray),
            fixtures::result("Show.S01E01.German.720p.WEB-DL-GRP", Quality::HdWebDl),
            fixtures::result("Show.S01E01.720p.HDTV-GRP", Quality::Hdtv),
        ];
        let allowed = show.profile.all_qualities();
        let winner = pick_best_result(candidates, &ctx(&show, &config, &history), Some(&allowed))
            .await
            .unwrap();
        assert_eq!(winner.name, "Show.S01E01.720p.HDTV-GRP");
    }

    #[tokio::test]
    async fn test_pick_never_returns_wordlist_failure() {
        let show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv], vec![]));
        let config = SearchConfig {
            words: crate::config::WordsConfig {
                ignore: WordList::default(),
                require: WordList::parse("720p"),
            },
            ..SearchConfig::default()
        };
        let history = SqliteHistory::in_memory().unwrap();
        let candidates = vec![
            fixtures::result("Show.S01E01.HDTV.x264-GRP", Quality::Hdtv),
            fixtures::result("Show.S01E01.HDTV.XviD-GRP", Quality::Hdtv),
        ];
        assert!(pick_best_result(candidates, &ctx(&show, &config, &history), None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_pick_skips_failed_downloads() {
        let show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv, Quality::HdWebDl], vec![]));
        let config = SearchConfig {
            use_failed_downloads: true,
            ..SearchConfig::default()
        };
        let history = SqliteHistory::in_memory().unwrap();
        history
            .mark_failed("Show.S01E01.720p.WEB-DL-GRP", None, "mock")
            .unwrap();

        let candidates = vec![
            fixtures::result("Show.S01E01.720p.WEB-DL-GRP", Quality::HdWebDl),
            fixtures::result("Show.S01E01.720p.HDTV-GRP", Quality::Hdtv),
        ];
        let winner = pick_best_result(candidates, &ctx(&show, &config, &history), None)
            .await
            .unwrap();
        assert_eq!(winner.quality, Quality::Hdtv);
    }

    #[tokio::test]
    async fn test_pick_anime_release_groups() {
        let mut show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv], vec![]));
        show.is_anime = true;
        show.release_groups.blacklist = vec!["BAD".to_string()];
        let config = SearchConfig::default();
        let history = SqliteHistory::in_memory().unwrap();

        let candidates = vec![fixtures::result("Show.S01E01.720p.HDTV-BAD", Quality::Hdtv)];
        assert!(pick_best_result(candidates, &ctx(&show, &config, &history), None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_pick_scene_fallback_only_without_strict() {
        let show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv, Quality::HdWebDl], vec![]));
        let config = SearchConfig::default();
        let history = SqliteHistory::in_memory().unwrap();

        let releases = MockReleaseDb::new();
        releases.add_release("Show.S01E01.720p.HDTV-SCENE").await;
        let scene = SceneChecker::new(Arc::new(releases.clone()), Arc::new(MockNukeDb::new()));

        let loose: Arc<dyn Provider> = Arc::new(MockProvider::new("loose").with_policy(ProviderPolicy {
            scene_loose: true,
            ..ProviderPolicy::default()
        }));

        let mut pick_ctx = ctx(&show, &config, &history);
        pick_ctx.scene = Some(&scene);

        let candidates = vec![
            fixtures::result_from(&loose, "Show.S01E01.720p.WEB-DL-P2P", Quality::HdWebDl),
            fixtures::result_from(&loose, "Show.S01E01.720p.HDTV-SCENE", Quality::Hdtv),
        ];
        let winner = pick_best_result(candidates, &pick_ctx, None).await.unwrap();
        assert_eq!(winner.name, "Show.S01E01.720p.HDTV-SCENE");

        let only_fallback = vec![fixtures::result_from(
            &loose,
            "Show.S01E01.720p.WEB-DL-P2P",
            Quality::HdWebDl,
        )];
        let winner = pick_best_result(only_fallback, &pick_ctx, None).await.unwrap();
        assert_eq!(winner.name, "Show.S01E01.720p.WEB-DL-P2P");
    }

    #[tokio::test]
    async fn test_pick_scene_skipped_for_anime() {
        let mut show = fixtures::show(QualityProfile::new(vec![Quality::Hdtv], vec![]));
        show.is_anime = true;
        let config = SearchConfig::default();
        let history = SqliteHistory::in_memory().unwrap();
        let releases = MockReleaseDb::new();
        let scene = SceneChecker::new(Arc::new(releases.clone()), Arc::new(MockNukeDb::new()));
        let strict: Arc<dyn Provider> = Arc::new(MockProvider::new("strict").with_policy(ProviderPolicy {
            scene_only: true,
            ..ProviderPolicy::default()
        }));

        let mut pick_ctx = ctx(&show, &config, &history);
        pick_ctx.scene = Some(&scene);
        let candidates = vec![fixtures::result_from(&strict, "Show.S01E01.720p.HDTV-SUBS", Quality::Hdtv)];
        assert!(pick_best_result(candidates, &pick_ctx, None).await.is_some());
        assert_eq!(releases.lookups().await, 0);
    }
}
