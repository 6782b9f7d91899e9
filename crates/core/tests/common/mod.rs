//! Shared setup for end-to-end search and snatch tests.
//!
//! Builds an in-memory episode store, an in-memory history and an engine
//! over mock providers, so a whole pass runs without any network.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use hunter_core::episode::EpisodeRef;
use hunter_core::provider::Provider;
use hunter_core::quality::{PackedStatus, Quality, QualityProfile, Status};
use hunter_core::testing::fixtures;
use hunter_core::{
    MemoryEpisodeStore, SearchConfig, SearchEngine, Show, SqliteHistory,
};

pub struct Fixture {
    pub store: Arc<MemoryEpisodeStore>,
    pub history: Arc<SqliteHistory>,
    pub show: Show,
}

impl Fixture {
    /// Show 1 with the given season 1 episodes.
    pub fn new(profile: QualityProfile, episodes: &[(u32, Status, Quality)]) -> Self {
        let show = fixtures::show(profile);
        let store = Arc::new(MemoryEpisodeStore::new());
        store.add_show(show.clone()).unwrap();
        for &(episode, status, quality) in episodes {
            store
                .add_episode(
                    EpisodeRef::new(show.id, 1, episode),
                    PackedStatus::compose(status, quality),
                    None,
                )
                .unwrap();
        }
        Self {
            store,
            history: Arc::new(SqliteHistory::in_memory().unwrap()),
            show,
        }
    }

    pub fn engine(&self, config: SearchConfig, providers: Vec<Arc<dyn Provider>>) -> SearchEngine {
        SearchEngine::new(
            Arc::new(config),
            providers,
            self.store.clone(),
            self.history.clone(),
        )
    }

    pub fn eps(&self, episodes: &[u32]) -> Vec<EpisodeRef> {
        episodes
            .iter()
            .map(|&e| EpisodeRef::new(self.show.id, 1, e))
            .collect()
    }

    pub fn status(&self, episode: u32) -> Option<PackedStatus> {
        self.store.status(&EpisodeRef::new(self.show.id, 1, episode))
    }
}

pub fn hd_profile() -> QualityProfile {
    QualityProfile::new(vec![Quality::Hdtv, Quality::HdWebDl], vec![])
}

pub fn wanted(episodes: &[u32]) -> Vec<(u32, Status, Quality)> {
    episodes
        .iter()
        .map(|&e| (e, Status::Wanted, Quality::None))
        .collect()
}

pub fn config_with_cache(cache_dir: &Path) -> SearchConfig {
    SearchConfig {
        cache_dir: cache_dir.to_path_buf(),
        ..SearchConfig::default()
    }
}

/// Minimal single-file `.torrent` whose info dictionary is named `name`.
pub fn torrent_bytes(name: &str) -> Vec<u8> {
    format!(
        "d8:announce20:http://tracker/announce4:infod6:lengthi2048e4:name{}:{}12:piece lengthi16384e6:pieces20:{}ee",
        name.len(),
        name,
        "b".repeat(20)
    )
    .into_bytes()
}

/// NZB document with one `<file>` per posted file name.
pub fn nzb_document(file_names: &[&str]) -> String {
    let files: Vec<String> = file_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<file poster="poster@example.com" date="1700000000" subject="[{}/{}] - &quot;{}&quot; yEnc (1/5)"><groups><group>alt.binaries.tv</group></groups><segments><segment bytes="500000" number="1">part{}@news</segment></segments></file>"#,
                i + 1,
                file_names.len(),
                name,
                i
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<nzb xmlns=\"http://www.newzbin.com/DTD/2003/nzb\">\n{}\n</nzb>\n",
        files.join("\n")
    )
}
