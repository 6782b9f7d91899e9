//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam of the engine, so search passes and
//! snatches can be exercised without indexers, reputation services or a
//! download client.
//!
//! # Example
//!
//! ```rust,ignore
//! use hunter_core::testing::{MockProvider, MockRelease};
//! use hunter_core::provider::SearchMode;
//!
//! let provider = MockProvider::new("indexer");
//! provider
//!     .set_results(SearchMode::Episode, vec![MockRelease::new("Show.S01E01.720p.HDTV.x264-GRP")])
//!     .await;
//!
//! // Keep a clone as a handle, move the other into the engine...
//! ```

mod mock_download_client;
mod mock_provider;
mod mock_reputation;

pub use mock_download_client::{MockDownloadClient, SentResult};
pub use mock_provider::{MockProvider, MockRelease};
pub use mock_reputation::{MockNukeDb, MockReleaseDb};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use super::{MockProvider, MockRelease};
    use crate::episode::Show;
    use crate::provider::Provider;
    use crate::quality::{Quality, QualityProfile};
    use crate::result::{ResultKind, SearchResult};

    /// Show 1, named "Show".
    pub fn show(profile: QualityProfile) -> Show {
        Show::new(1, "Show", profile)
    }

    /// An NZB result for show 1 from a fresh mock provider.
    ///
    /// Panics if `name` names no episode or season.
    pub fn result(name: &str, quality: Quality) -> SearchResult {
        let provider: Arc<dyn Provider> = Arc::new(MockProvider::new("mock"));
        result_from(&provider, name, quality)
    }

    /// An NZB result for show 1 from `provider`.
    pub fn result_from(provider: &Arc<dyn Provider>, name: &str, quality: Quality) -> SearchResult {
        let release = MockRelease::new(name)
            .with_quality(quality)
            .with_kind(ResultKind::Nzb);
        result_from_release(provider, release)
    }

    /// Complete `release` for show 1 from `provider`.
    pub fn result_from_release(provider: &Arc<dyn Provider>, release: MockRelease) -> SearchResult {
        let release = release.to_release(provider.policy().provider_type);
        SearchResult::from_release(release, 1, Arc::clone(provider))
            .unwrap_or_else(|| panic!("fixture release names no episode"))
    }
}
