//! Blackhole back-ends: drop the payload into a watched directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use super::client::{DispatchError, DownloadClient};
use crate::result::{ResultKind, SearchResult};

async fn write_file(dir: &Path, name: &str, ext: &str, data: &[u8]) -> Result<PathBuf, DispatchError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(sanitize_filename::sanitize(format!("{}.{}", name, ext)));
    tokio::fs::write(&path, data).await?;
    Ok(path)
}

/// Writes `.nzb` files.
pub struct NzbBlackhole {
    dir: PathBuf,
}

impl NzbBlackhole {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadClient for NzbBlackhole {
    fn name(&self) -> &str {
        "nzb_blackhole"
    }

    async fn send(&self, result: &SearchResult) -> Result<(), DispatchError> {
        let data = match &result.kind {
            ResultKind::NzbData { nzb } => nzb.clone().into_bytes(),
            ResultKind::Nzb => result.provider.download(&result.url).await?,
            ResultKind::Torrent { .. } => {
                return Err(DispatchError::Unsupported {
                    client: self.name().to_string(),
                    kind: result.kind.label(),
                })
            }
        };
        if data.is_empty() {
            return Err(DispatchError::MissingPayload(result.name.clone()));
        }

        let path = write_file(&self.dir, &result.name, "nzb", &data).await?;
        info!(name = %result.name, path = %path.display(), "Saved NZB to blackhole");
        Ok(())
    }
}

/// Writes `.torrent` payloads, or `.magnet` files holding the URI.
pub struct TorrentBlackhole {
    dir: PathBuf,
}

impl TorrentBlackhole {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DownloadClient for TorrentBlackhole {
    fn name(&self) -> &str {
        "torrent_blackhole"
    }

    async fn send(&self, result: &SearchResult) -> Result<(), DispatchError> {
        if !result.is_torrent() {
            return Err(DispatchError::Unsupported {
                client: self.name().to_string(),
                kind: result.kind.label(),
            });
        }

        let path = if result.is_magnet() {
            write_file(&self.dir, &result.name, "magnet", result.url.as_bytes()).await?
        } else {
            let data = result
                .content()
                .ok_or_else(|| DispatchError::MissingPayload(result.name.clone()))?;
            write_file(&self.dir, &result.name, "torrent", data).await?
        };
        info!(name = %result.name, path = %path.display(), "Saved torrent to blackhole");
        Ok(())
    }
}
