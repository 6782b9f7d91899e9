//! Provider orchestration for backlog and recent searches.

mod engine;
mod nzb_split;
mod reconcile;
mod torrent;
mod worker;

pub use engine::{SearchEngine, SearchOptions};
pub use nzb_split::{split_nzb, NzbPart, NzbSplitError};
pub use torrent::{cache_path, embedded_name, write_cache, TorrentParseError};

#[cfg(test)]
pub(crate) use torrent::single_file_torrent;
