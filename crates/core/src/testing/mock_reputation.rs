//! Mock reputation services for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::filter::{NukeDatabase, NukeInfo, PreRecord, ReleaseDatabase, ReputationError};

/// Mock release database. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockReleaseDb {
    releases: Arc<RwLock<HashSet<String>>>,
    unreachable: Arc<RwLock<bool>>,
    lookups: Arc<RwLock<usize>>,
}

impl MockReleaseDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_release(&self, name: &str) {
        self.releases.write().await.insert(name.to_string());
    }

    /// Every lookup fails with a connection error while set.
    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    pub async fn lookups(&self) -> usize {
        *self.lookups.read().await
    }
}

#[async_trait]
impl ReleaseDatabase for MockReleaseDb {
    fn name(&self) -> &str {
        "mock-releases"
    }

    async fn find_release(&self, release: &str) -> Result<Option<String>, ReputationError> {
        *self.lookups.write().await += 1;
        if *self.unreachable.read().await {
            return Err(ReputationError::ConnectionFailed("mock unreachable".to_string()));
        }
        Ok(self
            .releases
            .read()
            .await
            .contains(release)
            .then(|| release.to_string()))
    }
}

/// Mock pre database. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockNukeDb {
    pres: Arc<RwLock<HashMap<String, PreRecord>>>,
    unreachable: Arc<RwLock<bool>>,
    lookups: Arc<RwLock<usize>>,
}

impl MockNukeDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pre; `nuke` is `(kind, reason)`.
    pub async fn add_pre(&self, name: &str, pre_at: i64, nuke: Option<(&str, &str)>) {
        self.pres.write().await.insert(
            name.to_string(),
            PreRecord {
                name: name.to_string(),
                pre_at,
                nuke: nuke.map(|(kind, reason)| NukeInfo {
                    kind: kind.to_string(),
                    reason: Some(reason.to_string()),
                }),
            },
        );
    }

    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    pub async fn lookups(&self) -> usize {
        *self.lookups.read().await
    }
}

#[async_trait]
impl NukeDatabase for MockNukeDb {
    fn name(&self) -> &str {
        "mock-pres"
    }

    async fn find_pre(&self, release: &str) -> Result<Option<PreRecord>, ReputationError> {
        *self.lookups.write().await += 1;
        if *self.unreachable.read().await {
            return Err(ReputationError::ConnectionFailed("mock unreachable".to_string()));
        }
        Ok(self.pres.read().await.get(release).cloned())
    }
}
