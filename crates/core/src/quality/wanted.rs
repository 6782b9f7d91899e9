use serde::{Deserialize, Serialize};

use super::{Quality, Status};

/// Per-show quality policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Qualities accepted on a first match.
    #[serde(default)]
    pub any_qualities: Vec<Quality>,
    /// Qualities worth upgrading to.
    #[serde(default)]
    pub best_qualities: Vec<Quality>,
    /// Stop searching once an episode is snatched at a best quality.
    #[serde(default)]
    pub upgrade_once: bool,
}

impl QualityProfile {
    pub fn new(any_qualities: Vec<Quality>, best_qualities: Vec<Quality>) -> Self {
        Self {
            any_qualities,
            best_qualities,
            upgrade_once: false,
        }
    }

    pub fn with_upgrade_once(mut self, upgrade_once: bool) -> Self {
        self.upgrade_once = upgrade_once;
        self
    }

    /// Sorted union of any and best qualities.
    pub fn all_qualities(&self) -> Vec<Quality> {
        let mut all: Vec<Quality> = self
            .any_qualities
            .iter()
            .chain(self.best_qualities.iter())
            .copied()
            .collect();
        all.sort();
        all.dedup();
        all
    }

    pub fn max_best(&self) -> Option<Quality> {
        self.best_qualities.iter().copied().max()
    }

    pub fn max_any(&self) -> Option<Quality> {
        self.any_qualities.iter().copied().max()
    }
}

/// Qualities a new result may have for an episode to still want it.
///
/// An empty list means the episode is not searched in this pass.
pub fn wanted_qualities(
    profile: &QualityProfile,
    cur_status: Status,
    cur_quality: Quality,
    include_unaired: bool,
    manual: bool,
) -> Vec<Quality> {
    if cur_status.is_held() {
        if !manual {
            match cur_status {
                Status::SnatchedBest | Status::Archived => return Vec::new(),
                _ if profile.upgrade_once && profile.best_qualities.contains(&cur_quality) => {
                    return Vec::new()
                }
                _ => {}
            }
        }
        let mut upgrades: Vec<Quality> = profile
            .best_qualities
            .iter()
            .copied()
            .filter(|q| *q > cur_quality)
            .collect();
        upgrades.sort();
        upgrades.dedup();
        return upgrades;
    }

    let eligible = match cur_status {
        Status::Wanted | Status::Failed => true,
        Status::Unaired => include_unaired || manual,
        Status::Skipped | Status::Ignored | Status::Unknown => manual,
        _ => false,
    };

    if eligible {
        profile.all_qualities()
    } else {
        Vec::new()
    }
}
