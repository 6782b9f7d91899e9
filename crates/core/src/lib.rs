pub mod config;
pub mod episode;
pub mod events;
pub mod filter;
pub mod history;
pub mod metrics;
pub mod naming;
pub mod provider;
pub mod quality;
pub mod ranking;
pub mod result;
pub mod search;
pub mod snatch;
pub mod store;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, ConfigError, SanitizedConfig,
    SearchConfig,
};
pub use episode::{EpisodeRef, Show, WantedEpisode};
pub use events::{EventHandle, SearchEvent};
pub use filter::{SceneChecker, SceneGate, SceneStatus};
pub use history::{History, HistoryError, SqliteHistory};
pub use provider::{JackettProvider, Provider, ProviderError, ProviderPolicy};
pub use quality::{PackedStatus, Quality, QualityProfile, Status};
pub use result::{Release, ResultKind, SearchResult};
pub use search::{SearchEngine, SearchOptions};
pub use snatch::{DispatchError, DownloadClient, SnatchError, Snatcher};
pub use store::{EpisodeStore, MemoryEpisodeStore, StoreError};
