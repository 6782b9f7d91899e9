//! Boolean gates applied to candidate releases: word lists and scene reputation.

mod reputation;
mod scene;
mod wordlist;

pub use reputation::{
    NukeDatabase, NukeInfo, PreDbClient, PreRecord, ReleaseDatabase, ReputationError,
    SrrDbClient,
};
pub use scene::{SceneChecker, SceneGate, SceneStatus};
pub use wordlist::{passes_show_wordlist, passes_wordlist, WordList};
