//! End-to-end search passes over mock providers.

mod common;

use std::sync::Arc;

use common::{config_with_cache, hd_profile, nzb_document, torrent_bytes, wanted, Fixture};
use hunter_core::config::WordsConfig;
use hunter_core::filter::WordList;
use hunter_core::provider::{Provider, ProviderPolicy, ProviderType, SearchMode};
use hunter_core::quality::{Quality, Status};
use hunter_core::result::ResultKind;
use hunter_core::testing::{MockNukeDb, MockProvider, MockRelease, MockReleaseDb};
use hunter_core::{SceneChecker, SearchConfig, SearchOptions};

fn nzb_provider(id: &str) -> MockProvider {
    MockProvider::new(id).with_policy(ProviderPolicy {
        provider_type: ProviderType::Nzb,
        ..ProviderPolicy::default()
    })
}

fn torrent_provider(id: &str) -> MockProvider {
    MockProvider::new(id).with_policy(ProviderPolicy {
        provider_type: ProviderType::Torrent,
        ..ProviderPolicy::default()
    })
}

fn magnet(name: &str, hash: &str) -> MockRelease {
    MockRelease::new(name).with_url(format!("magnet:?xt=urn:btih:{}", hash))
}

#[tokio::test]
async fn test_higher_quality_from_other_provider_wins() {
    let fixture = Fixture::new(hd_profile(), &wanted(&[1]));

    let hdtv = nzb_provider("hdtv-indexer");
    hdtv.set_results(
        SearchMode::Episode,
        vec![MockRelease::new("Show.S01E01.720p.HDTV.x264-GRP").with_quality(Quality::Hdtv)],
    )
    .await;
    let web = nzb_provider("web-indexer");
    web.set_results(
        SearchMode::Episode,
        vec![MockRelease::new("Show.S01E01.720p.WEB-DL.H264-GRP").with_quality(Quality::HdWebDl)],
    )
    .await;

    let engine = fixture.engine(SearchConfig::default(), vec![Arc::new(hdtv), Arc::new(web)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].quality, Quality::HdWebDl);
    assert_eq!(results[0].provider_id(), "web-indexer");
}

#[tokio::test]
async fn test_same_group_repack_wins() {
    let fixture = Fixture::new(hd_profile(), &wanted(&[1]));

    let provider = nzb_provider("p1");
    provider
        .set_results(
            SearchMode::Episode,
            vec![
                MockRelease::new("Show.S01E01.x264-GRP").with_quality(Quality::Hdtv),
                MockRelease::new("Show.S01E01.REPACK.x264-GRP").with_quality(Quality::Hdtv),
            ],
        )
        .await;

    let engine = fixture.engine(SearchConfig::default(), vec![Arc::new(provider)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Show.S01E01.REPACK.x264-GRP");
    assert_eq!(results[0].proper_level, 1);
}

#[tokio::test]
async fn test_partly_wanted_torrent_pack_becomes_multi_episode() {
    let mut episodes = wanted(&[1, 2, 3]);
    episodes.push((4, Status::Downloaded, Quality::HdWebDl));
    episodes.push((5, Status::Downloaded, Quality::HdWebDl));
    let fixture = Fixture::new(hd_profile(), &episodes);

    let provider = torrent_provider("t1");
    provider
        .set_results(
            SearchMode::Episode,
            vec![magnet("Show.S01.720p.HDTV.x264-GRP", "pack").with_quality(Quality::Hdtv)],
        )
        .await;

    let engine = fixture.engine(SearchConfig::default(), vec![Arc::new(provider)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1, 2, 3]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Show.S01.720p.HDTV.x264-GRP");
    assert_eq!(results[0].episodes, fixture.eps(&[1, 2, 3]));
    assert!(results[0].is_torrent());
}

#[tokio::test]
async fn test_fully_wanted_season_pack_ends_pass() {
    let fixture = Fixture::new(hd_profile(), &wanted(&[1, 2, 3]));

    let singles = nzb_provider("singles");
    singles
        .set_results(
            SearchMode::Episode,
            vec![MockRelease::new("Show.S01E01.720p.HDTV.x264-OTHER").with_quality(Quality::Hdtv)],
        )
        .await;
    let packs = torrent_provider("packs");
    packs
        .set_results(
            SearchMode::Episode,
            vec![magnet("Show.S01.720p.HDTV.x264-GRP", "pack").with_quality(Quality::Hdtv)],
        )
        .await;

    let engine = fixture.engine(
        SearchConfig::default(),
        vec![Arc::new(packs), Arc::new(singles)],
    );
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1, 2, 3]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Show.S01.720p.HDTV.x264-GRP");
    assert_eq!(results[0].episodes, fixture.eps(&[1, 2, 3]));
}

#[tokio::test]
async fn test_nzb_season_pack_split_into_episodes() {
    let mut episodes = wanted(&[1, 2]);
    episodes.push((3, Status::Downloaded, Quality::HdWebDl));
    let fixture = Fixture::new(hd_profile(), &episodes);

    let provider = nzb_provider("n1");
    provider
        .set_results(
            SearchMode::Episode,
            vec![MockRelease::new("Show.S01.720p.HDTV.x264-GRP").with_quality(Quality::Hdtv)],
        )
        .await;
    provider
        .set_download(
            "http://mock/Show.S01.720p.HDTV.x264-GRP",
            nzb_document(&[
                "Show.S01E01.720p.HDTV.x264-GRP.mkv",
                "Show.S01E02.720p.HDTV.x264-GRP.mkv",
                "Show.S01E03.720p.HDTV.x264-GRP.mkv",
                "Show.S01.720p.HDTV.x264-GRP.nfo",
            ])
            .into_bytes(),
        )
        .await;

    let engine = fixture.engine(SearchConfig::default(), vec![Arc::new(provider)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1, 2]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].name, "Show.S01E01.720p.HDTV.x264-GRP");
    assert_eq!(results[0].episodes, fixture.eps(&[1]));
    assert_eq!(results[1].name, "Show.S01E02.720p.HDTV.x264-GRP");
    for result in &results {
        match &result.kind {
            ResultKind::NzbData { nzb } => {
                assert_eq!(nzb.matches("<file ").count(), 1);
                assert!(!nzb.contains(".nfo"));
            }
            other => panic!("expected split NZB data, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn test_torrent_payload_is_cached() {
    let cache = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(hd_profile(), &wanted(&[1]));

    let provider = torrent_provider("t1");
    provider
        .set_results(
            SearchMode::Episode,
            vec![MockRelease::new("Show.S01E01.720p.HDTV.x264-GRP").with_quality(Quality::Hdtv)],
        )
        .await;
    provider
        .set_download(
            "http://mock/Show.S01E01.720p.HDTV.x264-GRP",
            torrent_bytes("Show.S01E01.720p.HDTV.x264-GRP"),
        )
        .await;

    let engine = fixture.engine(config_with_cache(cache.path()), vec![Arc::new(provider)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].content().is_some());
    let cached = results[0].cache_file().unwrap();
    assert!(cached.starts_with(cache.path()));
    assert!(cached.exists());
}

#[tokio::test]
async fn test_torrent_with_rejected_embedded_name_is_dropped() {
    let cache = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(hd_profile(), &wanted(&[1]));

    let provider = torrent_provider("t1");
    provider
        .set_results(
            SearchMode::Episode,
            vec![MockRelease::new("Show.S01E01.720p.HDTV.x264-GRP").with_quality(Quality::Hdtv)],
        )
        .await;
    provider
        .set_download(
            "http://mock/Show.S01E01.720p.HDTV.x264-GRP",
            torrent_bytes("Show.S01E01.720p.HDTV.German.x264-GRP"),
        )
        .await;

    let config = SearchConfig {
        words: WordsConfig {
            ignore: WordList::parse("german"),
            require: WordList::default(),
        },
        ..config_with_cache(cache.path())
    };
    let engine = fixture.engine(config, vec![Arc::new(provider)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1]), &SearchOptions::default())
        .await;

    assert!(results.is_empty());
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_malformed_torrent_is_dropped() {
    let cache = tempfile::tempdir().unwrap();
    let fixture = Fixture::new(hd_profile(), &wanted(&[1]));

    let provider = torrent_provider("t1");
    provider
        .set_results(
            SearchMode::Episode,
            vec![MockRelease::new("Show.S01E01.720p.HDTV.x264-GRP").with_quality(Quality::Hdtv)],
        )
        .await;
    provider
        .set_download("http://mock/Show.S01E01.720p.HDTV.x264-GRP", b"not bencode".to_vec())
        .await;

    let engine = fixture.engine(config_with_cache(cache.path()), vec![Arc::new(provider)]);
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1]), &SearchOptions::default())
        .await;

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_scene_confirmed_by_one_service_while_other_is_down() {
    let releases = MockReleaseDb::new();
    releases.set_unreachable(true).await;
    let pres = MockNukeDb::new();
    pres.add_pre("Show.S01E01.720p.HDTV.x264-GRP", 1_700_000_000, None)
        .await;

    let checker = SceneChecker::new(Arc::new(releases), Arc::new(pres));
    let status = checker.check("Show.S01E01.720p.HDTV.x264-GRP").await;

    assert!(!status.is_rejected());
}

#[tokio::test]
async fn test_scene_only_provider_needs_confirmation() {
    let fixture = Fixture::new(hd_profile(), &wanted(&[1]));

    let provider: Arc<dyn Provider> = Arc::new({
        let p = MockProvider::new("strict").with_policy(ProviderPolicy {
            provider_type: ProviderType::Nzb,
            scene_only: true,
            ..ProviderPolicy::default()
        });
        p.set_results(
            SearchMode::Episode,
            vec![
                MockRelease::new("Show.S01E01.720p.WEB-DL.H264-P2P").with_quality(Quality::HdWebDl),
                MockRelease::new("Show.S01E01.720p.HDTV.x264-SCENE").with_quality(Quality::Hdtv),
            ],
        )
        .await;
        p
    });

    let releases = MockReleaseDb::new();
    releases.add_release("Show.S01E01.720p.HDTV.x264-SCENE").await;
    let scene = SceneChecker::new(Arc::new(releases), Arc::new(MockNukeDb::new()));

    let engine = fixture
        .engine(SearchConfig::default(), vec![provider])
        .with_scene(Arc::new(scene));
    let results = engine
        .search_providers(&fixture.show, &fixture.eps(&[1]), &SearchOptions::default())
        .await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Show.S01E01.720p.HDTV.x264-SCENE");
}
