use anyhow::{Context, Result};
use async_trait::async_trait;
use client_core::RemoteFs;
use ninep::{Client, OpenMode, Stat};
use shared::domain::DirEntry;

/// The feed service's file tree over 9P.
pub struct NinepFs {
    client: Client,
}

impl NinepFs {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn dir_entry(stat: Stat) -> DirEntry {
    DirEntry {
        is_dir: stat.is_dir(),
        modified: stat.mtime,
        name: stat.name,
    }
}

#[async_trait]
impl RemoteFs for NinepFs {
    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let mut dir = self
            .client
            .open(path, OpenMode::Read)
            .await
            .with_context(|| format!("opening {path}"))?;
        let stats = dir
            .read_dir()
            .await
            .with_context(|| format!("listing {path}"))?;
        Ok(stats.into_iter().map(dir_entry).collect())
    }

    async fn read_chunk(&self, path: &str, limit: usize) -> Result<Vec<u8>> {
        let mut file = self
            .client
            .open(path, OpenMode::Read)
            .await
            .with_context(|| format!("opening {path}"))?;
        file.read_chunk(limit)
            .await
            .with_context(|| format!("reading {path}"))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut file = self
            .client
            .open(path, OpenMode::Write)
            .await
            .with_context(|| format!("opening {path}"))?;
        file.write_all(data)
            .await
            .with_context(|| format!("writing {path}"))?;
        file.close().await.with_context(|| format!("closing {path}"))
    }

    async fn stat(&self, path: &str) -> Result<DirEntry> {
        let stat = self
            .client
            .stat(path)
            .await
            .with_context(|| format!("stat {path}"))?;
        Ok(dir_entry(stat))
    }

    async fn unmount(&self) {
        self.client.unmount().await;
    }
}
