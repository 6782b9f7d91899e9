//! Snatch history and failed-download tracking.

mod sqlite;

pub use sqlite::SqliteHistory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::episode::EpisodeRef;
use crate::quality::{PackedStatus, Quality};
use crate::result::SearchResult;
use crate::store::StatusChange;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Database error: {0}")]
    Database(String),
}

/// One history line per episode touched by a snatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub episode: EpisodeRef,
    pub action: PackedStatus,
    pub quality: Quality,
    pub release: String,
    pub provider: String,
}

pub trait History: Send + Sync {
    /// True when this release was recorded as a failed download.
    ///
    /// Sizes are compared only when both sides know one.
    fn has_failed(&self, release: &str, size: Option<u64>, provider: &str) -> Result<bool, HistoryError>;

    fn mark_failed(&self, release: &str, size: Option<u64>, provider: &str) -> Result<(), HistoryError>;

    /// Remember a snatch and each episode's previous status so a failed
    /// download can be rolled back.
    fn add_snatched(
        &self,
        result: &SearchResult,
        changes: &[(EpisodeRef, StatusChange)],
    ) -> Result<(), HistoryError>;

    /// Status an episode had before its most recent recorded snatch.
    fn find_old_status(&self, episode: &EpisodeRef) -> Result<Option<PackedStatus>, HistoryError>;

    fn log_snatch(
        &self,
        result: &SearchResult,
        changes: &[(EpisodeRef, StatusChange)],
    ) -> Result<(), HistoryError>;

    /// Newest entries first.
    fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError>;
}
