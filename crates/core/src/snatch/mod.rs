//! Snatch dispatch: hand a chosen result to a download back-end, then
//! persist the new episode statuses and history.

mod blackhole;
mod client;
mod qbittorrent;
mod snatcher;

pub use blackhole::{NzbBlackhole, TorrentBlackhole};
pub use client::{DispatchError, DownloadClient};
pub use qbittorrent::QBittorrentClient;
pub use snatcher::{SnatchError, Snatcher};
