//! `FileSystemAccess` over `tokio::fs`.

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::FileSystemAccess};
use bytes::Bytes;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Relative paths resolve against an optional base directory, so the ledger
/// and error log can live wherever the host keeps its state.
#[derive(Debug, Clone, Default)]
pub struct TokioFileSystem {
    base_dir: Option<PathBuf>,
}

impl TokioFileSystem {
    /// Resolve relative paths against the working directory.
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// `progress.json` is staged as `progress.json.tmp` in the same directory,
    /// so the final rename never crosses a file system boundary.
    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("state"));
        name.push(".tmp");
        path.with_file_name(name)
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(path)).await?)
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        Ok(Bytes::from(fs::read(self.resolve(path)).await?))
    }

    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<()> {
        let path = self.resolve(path);
        Self::ensure_parent(&path).await?;

        let staging = Self::staging_path(&path);
        let mut file = fs::File::create(&staging).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&staging, &path).await?;
        debug!(path = ?path, size = data.len(), "Replaced state file");
        Ok(())
    }

    async fn append_file(&self, path: &Path, data: Bytes) -> Result<()> {
        let path = self.resolve(path);
        Self::ensure_parent(&path).await?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        Ok(fs::remove_file(self.resolve(path)).await?)
    }
}
