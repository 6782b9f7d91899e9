use serde::{Deserialize, Serialize};

use crate::filter::WordList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Nzb,
    Torrent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Episode,
    SeasonPack,
}

impl SearchMode {
    pub fn fallback(self) -> Self {
        match self {
            SearchMode::Episode => SearchMode::SeasonPack,
            SearchMode::SeasonPack => SearchMode::Episode,
        }
    }
}

/// Per-provider switches read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPolicy {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub anime_only: bool,
    #[serde(default = "default_true")]
    pub enable_backlog: bool,
    #[serde(default = "default_true")]
    pub enable_scheduled_backlog: bool,
    #[serde(default = "default_true")]
    pub enable_recent_search: bool,
    #[serde(default = "default_search_mode")]
    pub search_mode: SearchMode,
    #[serde(default)]
    pub search_fallback: bool,
    #[serde(default)]
    pub scene_only: bool,
    /// Names matching these words skip the scene check.
    #[serde(default)]
    pub scene_or_contain: WordList,
    #[serde(default)]
    pub scene_loose: bool,
    #[serde(default)]
    pub scene_loose_active: bool,
    #[serde(default)]
    pub scene_reject_nuked: bool,
    #[serde(default)]
    pub scene_nuked_active: bool,
}

impl ProviderPolicy {
    /// True when any scene flag asks for a reputation check.
    pub fn filters_scene(&self) -> bool {
        self.scene_only
            || self.scene_loose
            || self.scene_loose_active
            || self.scene_reject_nuked
            || self.scene_nuked_active
    }
}

impl Default for ProviderPolicy {
    fn default() -> Self {
        Self {
            active: true,
            provider_type: default_provider_type(),
            anime_only: false,
            enable_backlog: true,
            enable_scheduled_backlog: true,
            enable_recent_search: true,
            search_mode: default_search_mode(),
            search_fallback: false,
            scene_only: false,
            scene_or_contain: WordList::default(),
            scene_loose: false,
            scene_loose_active: false,
            scene_reject_nuked: false,
            scene_nuked_active: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_provider_type() -> ProviderType {
    ProviderType::Torrent
}

fn default_search_mode() -> SearchMode {
    SearchMode::Episode
}
