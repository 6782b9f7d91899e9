use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use super::{EpisodeRecord, EpisodeStore, StatusChange, StoreError};
use crate::episode::{EpisodeRef, Show};
use crate::quality::PackedStatus;

#[derive(Default)]
struct Inner {
    shows: BTreeMap<u64, Show>,
    episodes: BTreeMap<EpisodeRef, EpisodeRecord>,
}

/// Episode store held in memory, used by the CLI and tests.
#[derive(Default)]
pub struct MemoryEpisodeStore {
    inner: Mutex<Inner>,
}

impl MemoryEpisodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Storage(format!("store lock poisoned: {}", e)))
    }

    pub fn add_show(&self, show: Show) -> Result<(), StoreError> {
        self.lock()?.shows.insert(show.id, show);
        Ok(())
    }

    pub fn add_episode(
        &self,
        episode: EpisodeRef,
        status: PackedStatus,
        airdate: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        self.lock()?.episodes.insert(
            episode,
            EpisodeRecord {
                episode,
                status,
                airdate,
            },
        );
        Ok(())
    }

    pub fn status(&self, episode: &EpisodeRef) -> Option<PackedStatus> {
        self.lock()
            .ok()
            .and_then(|inner| inner.episodes.get(episode).map(|r| r.status))
    }
}

impl EpisodeStore for MemoryEpisodeStore {
    fn show(&self, show_id: u64) -> Result<Option<Show>, StoreError> {
        Ok(self.lock()?.shows.get(&show_id).cloned())
    }

    fn episode(&self, episode: &EpisodeRef) -> Result<Option<EpisodeRecord>, StoreError> {
        Ok(self.lock()?.episodes.get(episode).cloned())
    }

    fn season_episodes(&self, show_id: u64, season: u32) -> Result<Vec<EpisodeRecord>, StoreError> {
        let start = EpisodeRef::new(show_id, season, 0);
        let end = EpisodeRef::new(show_id, season, u32::MAX);
        Ok(self
            .lock()?
            .episodes
            .range(start..=end)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn update_statuses(
        &self,
        episodes: &[EpisodeRef],
        update: &mut dyn FnMut(PackedStatus) -> PackedStatus,
    ) -> Result<Vec<(EpisodeRef, StatusChange)>, StoreError> {
        let mut inner = self.lock()?;
        if let Some(missing) = episodes.iter().find(|ep| !inner.episodes.contains_key(*ep)) {
            return Err(StoreError::EpisodeNotFound(*missing));
        }

        let mut changes = Vec::with_capacity(episodes.len());
        for ep in episodes {
            if let Some(record) = inner.episodes.get_mut(ep) {
                let old = record.status;
                record.status = update(old);
                changes.push((
                    *ep,
                    StatusChange {
                        old,
                        new: record.status,
                    },
                ));
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{Quality, QualityProfile, Status};

    fn wanted() -> PackedStatus {
        PackedStatus::compose(Status::Wanted, Quality::None)
    }

    #[test]
    fn test_season_episodes_are_scoped() {
        let store = MemoryEpisodeStore::new();
        store.add_show(Show::new(1, "Show", QualityProfile::default())).unwrap();
        for (season, episode) in [(1, 2), (1, 1), (2, 1)] {
            store
                .add_episode(EpisodeRef::new(1, season, episode), wanted(), None)
                .unwrap();
        }
        store.add_episode(EpisodeRef::new(2, 1, 1), wanted(), None).unwrap();

        let season = store.season_episodes(1, 1).unwrap();
        assert_eq!(season.len(), 2);
        assert_eq!(season[0].episode, EpisodeRef::new(1, 1, 1));
        assert_eq!(season[1].episode, EpisodeRef::new(1, 1, 2));
    }

    #[test]
    fn test_update_statuses_returns_changes() {
        let store = MemoryEpisodeStore::new();
        let eps = [EpisodeRef::new(1, 1, 1), EpisodeRef::new(1, 1, 2)];
        for ep in eps {
            store.add_episode(ep, wanted(), None).unwrap();
        }

        let snatched = PackedStatus::compose(Status::Snatched, Quality::Hdtv);
        let changes = store.update_statuses(&eps, &mut |_| snatched).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].0, eps[1]);
        assert_eq!(changes[1].1.old, wanted());
        assert_eq!(changes[1].1.new, snatched);
        assert_eq!(store.status(&eps[0]), Some(snatched));
    }

    #[test]
    fn test_update_statuses_is_all_or_nothing() {
        let store = MemoryEpisodeStore::new();
        let present = EpisodeRef::new(1, 1, 1);
        store.add_episode(present, wanted(), None).unwrap();

        let snatched = PackedStatus::compose(Status::Snatched, Quality::Hdtv);
        let result = store.update_statuses(&[present, EpisodeRef::new(1, 1, 2)], &mut |_| snatched);
        assert!(matches!(result, Err(StoreError::EpisodeNotFound(ep)) if ep == EpisodeRef::new(1, 1, 2)));
        assert_eq!(store.status(&present), Some(wanted()));
    }
}
