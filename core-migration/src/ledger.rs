//! # Progress Ledger
//!
//! Durable record of which source entries the destination has confirmed.
//!
//! The ledger is the only thing that survives a restart. An id is added only
//! after the destination acknowledged the upload, and the whole record is
//! rewritten atomically on every flush, so a crash leaves either the previous
//! or the new version on disk.
//!
//! ## Format
//!
//! ```json
//! {
//!   "migrated_files": ["1AbC", "1XyZ"],
//!   "last_updated": "2024-05-01T10:00:00+00:00",
//!   "stats": { "total_files": 2, "migrated": 2, ... }
//! }
//! ```
//!
//! A document holding only `migrated_files` is accepted on load.

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use chrono::Utc;
use core_runtime::events::RunSummary;
use core_runtime::logging::strip_path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{MigrationError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    migrated_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stats: Option<RunSummary>,
}

pub struct ProgressLedger {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
    /// Insertion order, written to disk as-is
    order: Vec<String>,
    completed: HashSet<String>,
}

impl ProgressLedger {
    /// Load the ledger at `path`, or start empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed. A corrupt ledger
    /// is never silently discarded.
    #[instrument(skip_all, fields(ledger = %strip_path(&path.to_string_lossy())))]
    pub async fn load(fs: Arc<dyn FileSystemAccess>, path: PathBuf) -> Result<Self> {
        let mut ledger = Self {
            fs,
            path,
            order: Vec::new(),
            completed: HashSet::new(),
        };

        if !ledger.fs.exists(&ledger.path).await? {
            debug!("No ledger on disk, starting empty");
            return Ok(ledger);
        }

        let data = ledger.fs.read_file(&ledger.path).await?;
        let record: LedgerRecord = serde_json::from_slice(&data).map_err(|e| {
            MigrationError::Ledger(format!(
                "Failed to parse {}: {}",
                ledger.path.display(),
                e
            ))
        })?;

        for id in record.migrated_files {
            ledger.insert(id);
        }

        info!(entries = ledger.len(), "Loaded progress ledger");
        Ok(ledger)
    }

    fn insert(&mut self, id: String) -> bool {
        if self.completed.insert(id.clone()) {
            self.order.push(id);
            true
        } else {
            false
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.completed.contains(id)
    }

    /// Record a confirmed transfer. Returns `false` if the id was already present.
    ///
    /// Call [`flush`](Self::flush) to make it durable.
    pub fn mark_complete(&mut self, id: impl Into<String>) -> bool {
        self.insert(id.into())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Completed ids in the order they were recorded.
    pub fn completed_ids(&self) -> &[String] {
        &self.order
    }

    /// Atomically rewrite the ledger file with the current ids and `stats`.
    pub async fn flush(&self, stats: &RunSummary) -> Result<()> {
        let record = LedgerRecord {
            migrated_files: self.order.clone(),
            last_updated: Some(Utc::now().to_rfc3339()),
            stats: Some(stats.clone()),
        };

        let json = serde_json::to_vec_pretty(&record)
            .map_err(|e| MigrationError::Ledger(format!("Failed to serialize ledger: {}", e)))?;

        self.fs
            .write_file_atomic(&self.path, Bytes::from(json))
            .await
            .map_err(|e| {
                MigrationError::Ledger(format!("Failed to write {}: {}", self.path.display(), e))
            })?;

        debug!(entries = self.len(), "Ledger flushed");
        Ok(())
    }

    /// Forget every completed id and delete the file.
    pub async fn reset(&mut self) -> Result<()> {
        self.order.clear();
        self.completed.clear();

        if self.fs.exists(&self.path).await? {
            self.fs.delete_file(&self.path).await?;
        }

        info!("Progress ledger reset");
        Ok(())
    }
}

impl std::fmt::Debug for ProgressLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressLedger")
            .field("path", &self.path)
            .field("entries", &self.order.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("core-migration-ledger-{}", Uuid::new_v4()))
            .join("migration_progress.json")
    }

    fn fs() -> Arc<dyn FileSystemAccess> {
        Arc::new(TokioFileSystem::new())
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let ledger = ProgressLedger::load(fs(), temp_path()).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let path = temp_path();
        let mut ledger = ProgressLedger::load(fs(), path.clone()).await.unwrap();

        assert!(ledger.mark_complete("a"));
        assert!(ledger.mark_complete("b"));
        assert!(!ledger.mark_complete("a"));

        let stats = RunSummary {
            total_files: 2,
            migrated: 2,
            ..RunSummary::default()
        };
        ledger.flush(&stats).await.unwrap();

        let reloaded = ProgressLedger::load(fs(), path.clone()).await.unwrap();
        assert_eq!(reloaded.completed_ids(), &["a".to_string(), "b".to_string()]);
        assert!(reloaded.contains("b"));

        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["stats"]["migrated"], 2);
        assert!(json["last_updated"].is_string());
        assert!(raw.contains("\n  \"migrated_files\""));
    }

    #[tokio::test]
    async fn test_accepts_legacy_record() {
        let path = temp_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, r#"{"migrated_files": ["x", "y"]}"#)
            .await
            .unwrap();

        let ledger = ProgressLedger::load(fs(), path).await.unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error() {
        let path = temp_path();
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "{not json").await.unwrap();

        let err = ProgressLedger::load(fs(), path).await.unwrap_err();
        assert!(matches!(err, MigrationError::Ledger(_)));
    }

    #[tokio::test]
    async fn test_reset_deletes_file() {
        let path = temp_path();
        let mut ledger = ProgressLedger::load(fs(), path.clone()).await.unwrap();
        ledger.mark_complete("a");
        ledger.flush(&RunSummary::default()).await.unwrap();

        ledger.reset().await.unwrap();

        assert!(ledger.is_empty());
        assert!(!path.exists());
    }
}
