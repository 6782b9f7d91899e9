//! Shows and episode references as the engine sees them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::filter::WordList;
use crate::quality::{PackedStatus, Quality, QualityProfile};

/// Identity of one episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EpisodeRef {
    pub show_id: u64,
    pub season: u32,
    pub episode: u32,
}

impl EpisodeRef {
    pub fn new(show_id: u64, season: u32, episode: u32) -> Self {
        Self {
            show_id,
            season,
            episode,
        }
    }
}

impl fmt::Display for EpisodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:S{:02}E{:02}", self.show_id, self.season, self.episode)
    }
}

/// An episode selected for this pass with the qualities it will still accept.
///
/// Built fresh for every pass and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantedEpisode {
    pub episode: EpisodeRef,
    pub status: PackedStatus,
    pub wanted: Vec<Quality>,
}

impl WantedEpisode {
    pub fn wants(&self, quality: Quality) -> bool {
        self.wanted.contains(&quality)
    }
}

/// Release-group allow and block lists, applied to anime shows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseGroups {
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl ReleaseGroups {
    /// False when the group is blocked, or an allow list exists and does not name it.
    pub fn is_valid(&self, group: &str) -> bool {
        let matches = |list: &[String]| list.iter().any(|g| g.eq_ignore_ascii_case(group));
        if matches(&self.blacklist) {
            return false;
        }
        self.whitelist.is_empty() || matches(&self.whitelist)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub profile: QualityProfile,
    #[serde(default)]
    pub is_anime: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub ignore_words: WordList,
    #[serde(default)]
    pub require_words: WordList,
    #[serde(default)]
    pub release_groups: ReleaseGroups,
}

impl Show {
    pub fn new(id: u64, name: impl Into<String>, profile: QualityProfile) -> Self {
        Self {
            id,
            name: name.into(),
            profile,
            is_anime: false,
            paused: false,
            ignore_words: WordList::default(),
            require_words: WordList::default(),
            release_groups: ReleaseGroups::default(),
        }
    }
}
