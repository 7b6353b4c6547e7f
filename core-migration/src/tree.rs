//! # Remote Tree Enumerator
//!
//! Lists the whole source tree once, up front, and answers folder-path
//! questions against that snapshot.
//!
//! ## Path reconstruction
//!
//! A folder's path is found by following `parent_ids[0]` until the parent is
//! not a known folder (the drive root, or a folder shared from elsewhere).
//! The walk is bounded: revisiting a folder or going deeper than the
//! configured limit fails with [`MigrationError::PathCycle`] instead of
//! looping.
//!
//! ```text
//! A (root) ── B ── C        resolve_path(C) == ["A", "B", "C"]
//! ```

use bridge_traits::storage::{RemoteEntry, RemoteTreeSource};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{MigrationError, Result};
use crate::retry::RetryController;
use crate::sanitize::sanitize_filename;

/// Snapshot of the source tree taken at run start.
#[derive(Debug, Clone, Default)]
pub struct RemoteTree {
    folders: HashMap<String, RemoteEntry>,
    /// Listing order, one entry per id
    files: Vec<RemoteEntry>,
    total_bytes: u64,
}

impl RemoteTree {
    /// Partition listed entries into folders and files.
    ///
    /// A file id listed twice (pages shifting under concurrent edits) is kept
    /// once, at its first position.
    pub fn from_entries(entries: impl IntoIterator<Item = RemoteEntry>) -> Self {
        let mut tree = Self::default();
        let mut seen_files = HashSet::new();

        for entry in entries {
            if entry.is_folder() {
                tree.folders.insert(entry.id.clone(), entry);
            } else if seen_files.insert(entry.id.clone()) {
                tree.total_bytes = tree.total_bytes.saturating_add(entry.size);
                tree.files.push(entry);
            }
        }

        tree
    }

    pub fn folders(&self) -> &HashMap<String, RemoteEntry> {
        &self.folders
    }

    pub fn files(&self) -> &[RemoteEntry] {
        &self.files
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn folder_count(&self) -> usize {
        self.folders.len()
    }

    /// Sum of all file sizes.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Sanitized folder segments for the folder holding `file`.
    ///
    /// Files whose parent is not a listed folder land at the root (`[]`).
    pub fn folder_path_for(&self, file: &RemoteEntry, max_depth: usize) -> Result<Vec<String>> {
        match file.first_parent() {
            Some(parent) if self.folders.contains_key(parent) => {
                resolve_path(parent, &self.folders, max_depth)
            }
            _ => Ok(Vec::new()),
        }
    }
}

/// Walk parent links from `folder_id` and return sanitized names, root first.
///
/// # Errors
///
/// [`MigrationError::PathCycle`] when the chain revisits a folder or exceeds
/// `max_depth` levels.
pub fn resolve_path(
    folder_id: &str,
    folders: &HashMap<String, RemoteEntry>,
    max_depth: usize,
) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut visited = HashSet::new();
    let mut current = folders.get(folder_id);

    while let Some(folder) = current {
        if !visited.insert(folder.id.as_str()) || segments.len() >= max_depth {
            return Err(MigrationError::PathCycle {
                folder_id: folder_id.to_string(),
                depth: max_depth,
            });
        }

        segments.push(sanitize_filename(&folder.name));
        current = folder.first_parent().and_then(|parent| folders.get(parent));
    }

    segments.reverse();
    Ok(segments)
}

/// Pages through a [`RemoteTreeSource`] until the listing is exhausted.
pub struct TreeEnumerator {
    source: Arc<dyn RemoteTreeSource>,
    retry: RetryController,
}

impl TreeEnumerator {
    pub fn new(source: Arc<dyn RemoteTreeSource>, retry: RetryController) -> Self {
        Self { source, retry }
    }

    /// List every non-trashed entry.
    ///
    /// Each page is retried on its own; a page that still fails ends the
    /// enumeration with that page's error.
    #[instrument(skip(self))]
    pub async fn enumerate(&self) -> Result<RemoteTree> {
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0u32;

        loop {
            let token = page_token.clone();
            let page = self
                .retry
                .attempt("list_page", move || {
                    let token = token.clone();
                    async move { Ok(self.source.list_page(token).await?) }
                })
                .await
                .map_err(|e| e.into_error())?;

            pages += 1;
            debug!(page = pages, entries = page.entries.len(), "Listed page");
            entries.extend(page.entries);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        let tree = RemoteTree::from_entries(entries);
        info!(
            pages,
            files = tree.file_count(),
            folders = tree.folder_count(),
            total_bytes = tree.total_bytes(),
            "Enumerated source tree"
        );
        Ok(tree)
    }
}
