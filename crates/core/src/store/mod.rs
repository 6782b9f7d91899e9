//! Episode persistence as seen by the engine.

mod memory;

pub use memory::MemoryEpisodeStore;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::episode::{EpisodeRef, Show};
use crate::quality::PackedStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Show not found: {0}")]
    ShowNotFound(u64),

    #[error("Episode not found: {0}")]
    EpisodeNotFound(EpisodeRef),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode: EpisodeRef,
    pub status: PackedStatus,
    pub airdate: Option<NaiveDate>,
}

/// Status before and after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub old: PackedStatus,
    pub new: PackedStatus,
}

/// Lookup and status write path for shows and episodes.
pub trait EpisodeStore: Send + Sync {
    fn show(&self, show_id: u64) -> Result<Option<Show>, StoreError>;

    fn episode(&self, episode: &EpisodeRef) -> Result<Option<EpisodeRecord>, StoreError>;

    /// Every known episode of a season, ordered by episode number.
    fn season_episodes(&self, show_id: u64, season: u32) -> Result<Vec<EpisodeRecord>, StoreError>;

    /// Read-modify-write of several episodes' statuses under the store's lock.
    ///
    /// Either every episode is updated or none is. A missing episode fails the
    /// whole call with [`StoreError::EpisodeNotFound`].
    fn update_statuses(
        &self,
        episodes: &[EpisodeRef],
        update: &mut dyn FnMut(PackedStatus) -> PackedStatus,
    ) -> Result<Vec<(EpisodeRef, StatusChange)>, StoreError>;
}
