//! Storage Abstractions
//!
//! Provider-neutral contracts for the migration source and destination, plus
//! the local file system access used for the ledger and error log.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::http::ByteStream;

/// Local state files: the progress ledger and the error log.
///
/// Implementations create missing parent directories on write.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool>;

    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Replace a file's contents so readers see either the old or the new
    /// version, never a torn write.
    async fn write_file_atomic(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Append to the file, creating it if needed.
    async fn append_file(&self, path: &Path, data: Bytes) -> Result<()>;

    async fn delete_file(&self, path: &Path) -> Result<()>;
}

/// Entry kind in a remote tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Folder,
    File,
}

/// A file or folder as listed by the source provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Provider-specific identifier, stable for the run
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
    /// Parent folder IDs; only the first one is used for path reconstruction
    pub parent_ids: Vec<String>,
    /// Size in bytes (0 for folders and native documents)
    pub size: u64,
    /// Provider MIME type
    pub content_type: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default)]
pub struct EntryPage {
    pub entries: Vec<RemoteEntry>,
    /// Token for the next page; `None` when the listing is exhausted
    pub next_page_token: Option<String>,
}

/// Questionnaire structure as returned by the source provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDocument {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Vec<FormItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormItem {
    pub title: Option<String>,
    pub question: FormQuestion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormQuestion {
    Choice { options: Vec<String> },
    Text { paragraph: bool },
    /// Section headers, images and other non-question items
    Other,
}

/// Source side of a migration
///
/// Implemented by provider connectors. All failures must already be classified
/// (see [`BridgeError::kind`](crate::error::BridgeError::kind)).
#[async_trait]
pub trait RemoteTreeSource: Send + Sync {
    /// List one page of non-trashed entries.
    async fn list_page(&self, page_token: Option<String>) -> Result<EntryPage>;

    /// Query the size of an entry. `Ok(None)` when the provider reports none.
    async fn remote_size(&self, id: &str) -> Result<Option<u64>>;

    /// Open the raw content of a binary file as a stream.
    async fn download(&self, id: &str) -> Result<ByteStream>;

    /// Export a native document to the given MIME type.
    async fn export(&self, id: &str, mime_type: &str) -> Result<Bytes>;

    /// Fetch the structure of a questionnaire.
    async fn fetch_form(&self, id: &str) -> Result<FormDocument>;
}

/// Result of a single chunk submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// Chunk stored, more expected
    Accepted,
    /// Final chunk stored and the item was created
    Completed,
}

/// Destination side of a migration
///
/// Paths are `/`-separated and relative to the destination drive root.
#[async_trait]
pub trait UploadDestination: Send + Sync {
    /// Whether an item exists at the given path.
    async fn item_exists(&self, path: &str) -> Result<bool>;

    /// Create `name` under `parent` (`None` for the root). An existing folder
    /// counts as success.
    async fn create_folder(&self, parent: Option<&str>, name: &str) -> Result<()>;

    /// Upload a payload in a single request.
    async fn upload_small(&self, path: &str, data: Bytes) -> Result<()>;

    /// Open a resumable upload session and return its upload URL.
    async fn create_upload_session(&self, path: &str) -> Result<String>;

    /// Send bytes `start..=end` of a `total`-byte upload.
    async fn upload_chunk(
        &self,
        session_url: &str,
        start: u64,
        end: u64,
        total: u64,
        data: Bytes,
    ) -> Result<ChunkStatus>;

    /// Obtain fresh credentials after an `AuthExpired` failure.
    async fn reauthenticate(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: EntryKind, parents: &[&str]) -> RemoteEntry {
        RemoteEntry {
            id: "id-1".to_string(),
            name: "Report".to_string(),
            kind,
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            size: 0,
            content_type: "application/pdf".to_string(),
            modified_at: None,
        }
    }

    #[test]
    fn test_remote_entry_helpers() {
        let folder = entry(EntryKind::Folder, &["root"]);
        assert!(folder.is_folder());
        assert_eq!(folder.first_parent(), Some("root"));

        let orphan = entry(EntryKind::File, &[]);
        assert!(!orphan.is_folder());
        assert_eq!(orphan.first_parent(), None);
    }
}
