//! `.torrent` payload handling for content validation.
//!
//! Uses librqbit-core to read the name embedded in the bencoded info
//! dictionary, which is what a torrent client will actually create on disk.

use std::path::{Path, PathBuf};

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorrentParseError {
    #[error("Failed to parse torrent: {0}")]
    ParseError(String),

    #[error("Torrent has no name")]
    MissingName,
}

/// Name from the torrent's info dictionary.
pub fn embedded_name(bytes: &[u8]) -> Result<String, TorrentParseError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| TorrentParseError::ParseError(e.to_string()))?;

    let name = torrent
        .info
        .name
        .as_ref()
        .map(|b| String::from_utf8_lossy(b.as_ref()).into_owned())
        .ok_or(TorrentParseError::MissingName)?;

    if name.trim().is_empty() {
        return Err(TorrentParseError::MissingName);
    }
    Ok(name)
}

/// Cache path for a release's `.torrent` payload.
pub fn cache_path(cache_dir: &Path, release: &str) -> PathBuf {
    cache_dir.join(sanitize_filename::sanitize(format!("{}.torrent", release)))
}

/// Write a payload into the cache directory, creating it if needed.
pub async fn write_cache(cache_dir: &Path, release: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(cache_dir).await?;
    let path = cache_path(cache_dir, release);
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

#[cfg(test)]
pub(crate) fn single_file_torrent(name: &str) -> Vec<u8> {
    let pieces = "a".repeat(20);
    format!(
        "d8:announce20:http://tracker/announce4:infod6:lengthi1024e4:name{}:{}12:piece lengthi16384e6:pieces20:{}ee",
        name.len(),
        name,
        pieces
    )
    .into_bytes()
}
