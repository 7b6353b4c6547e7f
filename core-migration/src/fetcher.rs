//! # Content Fetcher
//!
//! Turns one remote entry into uploadable content.
//!
//! | Source type | Retrieval | Final name |
//! |-------------|-----------|------------|
//! | Google document / spreadsheet / presentation | export | `name.docx` / `.xlsx` / `.pptx` |
//! | Google form | Forms API + [`DocumentBuilder`] | `name_form.docx` |
//! | anything else | direct download stream | `name` |
//!
//! Exports are preceded by a size query: the provider refuses exports past a
//! fixed size, so larger documents fail fast with `ExportTooLarge`.
//!
//! Transient failures (timeouts, 5xx, TLS) are retried here with exponential
//! backoff; everything else is returned at once, classified.

use bridge_traits::error::TransferErrorKind;
use bridge_traits::http::ByteStream;
use bridge_traits::storage::{RemoteEntry, RemoteTreeSource};
use bytes::Bytes;
use core_runtime::config::MigrationConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{MigrationError, Result};
use crate::form::{DocumentBuilder, FormOutline};
use crate::sanitize::{format_size, sanitize_filename};

pub const GOOGLE_APPS_PREFIX: &str = "application/vnd.google-apps.";
pub const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
pub const FORM_MIME: &str = "application/vnd.google-apps.form";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Native document type → (export MIME type, extension)
const EXPORTS: &[(&str, &str, &str)] = &[
    ("application/vnd.google-apps.document", DOCX_MIME, ".docx"),
    (
        "application/vnd.google-apps.spreadsheet",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    (
        "application/vnd.google-apps.presentation",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ".pptx",
    ),
];

const FORM_SUFFIX: &str = "_form.docx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retrieval {
    Export {
        mime_type: &'static str,
        extension: &'static str,
    },
    Form,
    Download,
}

fn retrieval_for(content_type: &str) -> Retrieval {
    if content_type == FORM_MIME {
        return Retrieval::Form;
    }
    EXPORTS
        .iter()
        .find(|(native, _, _)| *native == content_type)
        .map(|&(_, mime_type, extension)| Retrieval::Export {
            mime_type,
            extension,
        })
        .unwrap_or(Retrieval::Download)
}

pub enum ContentBody {
    Buffered(Bytes),
    Stream(ByteStream),
}

/// Content ready for upload.
pub struct FetchedContent {
    /// Sanitized destination file name
    pub name: String,
    /// Exact number of bytes `body` yields
    pub size: u64,
    pub body: ContentBody,
}

impl FetchedContent {
    pub fn buffered(name: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            size: data.len() as u64,
            body: ContentBody::Buffered(data),
        }
    }

    pub fn stream(name: impl Into<String>, size: u64, stream: ByteStream) -> Self {
        Self {
            name: name.into(),
            size,
            body: ContentBody::Stream(stream),
        }
    }

    pub fn into_reader(self) -> ByteStream {
        match self.body {
            ContentBody::Buffered(data) => Box::new(std::io::Cursor::new(data)),
            ContentBody::Stream(stream) => stream,
        }
    }

    /// Drain the body into memory.
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self.body {
            ContentBody::Buffered(data) => Ok(data),
            ContentBody::Stream(mut stream) => {
                let mut buffer = Vec::with_capacity(self.size as usize);
                stream.read_to_end(&mut buffer).await.map_err(|e| {
                    MigrationError::transfer(TransferErrorKind::NetworkTransient, e.to_string())
                })?;
                Ok(Bytes::from(buffer))
            }
        }
    }
}

impl std::fmt::Debug for FetchedContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match self.body {
            ContentBody::Buffered(_) => "buffered",
            ContentBody::Stream(_) => "stream",
        };
        f.debug_struct("FetchedContent")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("body", &body)
            .finish()
    }
}

pub struct ContentFetcher {
    source: Arc<dyn RemoteTreeSource>,
    builder: Option<Arc<dyn DocumentBuilder>>,
    max_export_size: u64,
    max_file_size: u64,
    attempts: u32,
    backoff_base: Duration,
}

impl ContentFetcher {
    pub fn new(
        source: Arc<dyn RemoteTreeSource>,
        max_export_size: u64,
        max_file_size: u64,
        attempts: u32,
        backoff_base: Duration,
    ) -> Self {
        Self {
            source,
            builder: None,
            max_export_size,
            max_file_size,
            attempts: attempts.max(1),
            backoff_base,
        }
    }

    pub fn from_config(config: &MigrationConfig, source: Arc<dyn RemoteTreeSource>) -> Self {
        Self::new(
            source,
            config.max_export_size,
            config.max_file_size,
            config.fetch_attempts,
            config.fetch_backoff_base,
        )
    }

    pub fn with_document_builder(mut self, builder: Arc<dyn DocumentBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Why `entry` cannot be transferred, or `None` if it can.
    pub fn unsupported_reason(&self, entry: &RemoteEntry) -> Option<String> {
        if entry.is_folder() || entry.content_type == FOLDER_MIME {
            return Some("folders are recreated, not transferred".to_string());
        }

        match retrieval_for(&entry.content_type) {
            Retrieval::Form if self.builder.is_none() => {
                Some("no document builder configured for forms".to_string())
            }
            Retrieval::Download if entry.content_type.starts_with(GOOGLE_APPS_PREFIX) => Some(
                format!("{} cannot be exported", entry.content_type),
            ),
            Retrieval::Download if entry.size > self.max_file_size => Some(format!(
                "{} exceeds the {} limit",
                format_size(entry.size),
                format_size(self.max_file_size)
            )),
            _ => None,
        }
    }

    pub fn is_supported(&self, entry: &RemoteEntry) -> bool {
        self.unsupported_reason(entry).is_none()
    }

    /// Destination file name for `entry`, known before any transfer.
    pub fn final_name(&self, entry: &RemoteEntry) -> String {
        let base = sanitize_filename(&entry.name);
        match retrieval_for(&entry.content_type) {
            Retrieval::Export { extension, .. } => format!("{}{}", base, extension),
            Retrieval::Form => format!("{}{}", base, FORM_SUFFIX),
            Retrieval::Download => base,
        }
    }

    /// Retrieve the content of `entry`.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Unsupported`] if [`is_supported`](Self::is_supported) is false
    /// - [`MigrationError::Transfer`] with `ExportTooLarge` when the pre-flight size check fails
    /// - the last classified provider error once transient retries are spent
    /// - [`MigrationError::Cancelled`] if `cancel` fires during a backoff
    #[instrument(skip(self, entry, cancel), fields(id = %entry.id))]
    pub async fn fetch(
        &self,
        entry: &RemoteEntry,
        cancel: &CancellationToken,
    ) -> Result<FetchedContent> {
        if let Some(reason) = self.unsupported_reason(entry) {
            return Err(MigrationError::Unsupported {
                name: entry.name.clone(),
                reason,
            });
        }

        let name = self.final_name(entry);
        let id = entry.id.as_str();

        match retrieval_for(&entry.content_type) {
            Retrieval::Export { mime_type, .. } => {
                self.check_export_size(id).await?;
                let data = self
                    .with_transient_retry(cancel, || self.source.export(id, mime_type))
                    .await?;
                debug!(bytes = data.len(), "Exported document");
                Ok(FetchedContent::buffered(name, data))
            }
            Retrieval::Form => {
                let document = self
                    .with_transient_retry(cancel, || self.source.fetch_form(id))
                    .await?;
                let outline = FormOutline::from_document(&document);
                let builder = self.builder.as_ref().ok_or_else(|| {
                    MigrationError::DocumentBuilder("no builder configured".to_string())
                })?;
                let data = builder.build(&outline)?;
                debug!(questions = outline.questions.len(), "Built form document");
                Ok(FetchedContent::buffered(name, data))
            }
            Retrieval::Download => {
                let stream = self
                    .with_transient_retry(cancel, || self.source.download(id))
                    .await?;
                Ok(FetchedContent::stream(name, entry.size, stream))
            }
        }
    }

    async fn check_export_size(&self, id: &str) -> Result<()> {
        match self.source.remote_size(id).await {
            Ok(Some(size)) if size > self.max_export_size => Err(MigrationError::transfer(
                TransferErrorKind::ExportTooLarge,
                format!(
                    "{} exceeds the {} export limit",
                    format_size(size),
                    format_size(self.max_export_size)
                ),
            )),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Size query failed, attempting export anyway");
                Ok(())
            }
        }
    }

    async fn with_transient_retry<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bridge_traits::error::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let kind = error.kind();
            let transient = matches!(
                kind,
                TransferErrorKind::NetworkTransient | TransferErrorKind::BackendTemporary
            );
            if !transient || attempt + 1 >= self.attempts {
                return Err(error.into());
            }

            let delay = self.backoff_base.saturating_mul(1u32 << attempt.min(16));
            attempt += 1;
            debug!(%kind, attempt, ?delay, "Transient fetch failure, retrying");

            tokio::select! {
                _ = cancel.cancelled() => return Err(MigrationError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::{EntryKind, EntryPage, FormDocument, FormItem, FormQuestion};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubSource {
        size: Option<u64>,
        size_fails: bool,
        export_failures: Mutex<Vec<BridgeError>>,
        export_calls: AtomicU32,
        size_calls: AtomicU32,
    }

    #[async_trait]
    impl RemoteTreeSource for StubSource {
        async fn list_page(&self, _page_token: Option<String>) -> BridgeResult<EntryPage> {
            Ok(EntryPage::default())
        }

        async fn remote_size(&self, _id: &str) -> BridgeResult<Option<u64>> {
            self.size_calls.fetch_add(1, Ordering::SeqCst);
            if self.size_fails {
                return Err(BridgeError::remote(TransferErrorKind::Unknown, "size"));
            }
            Ok(self.size)
        }

        async fn download(&self, _id: &str) -> BridgeResult<ByteStream> {
            Ok(Box::new(std::io::Cursor::new(b"raw bytes".to_vec())))
        }

        async fn export(&self, _id: &str, mime_type: &str) -> BridgeResult<Bytes> {
            self.export_calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.export_failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
            Ok(Bytes::from(mime_type.to_string()))
        }

        async fn fetch_form(&self, _id: &str) -> BridgeResult<FormDocument> {
            Ok(FormDocument {
                title: Some("Poll".to_string()),
                description: None,
                items: vec![FormItem {
                    title: Some("Name".to_string()),
                    question: FormQuestion::Text { paragraph: false },
                }],
            })
        }
    }

    struct TextBuilder;

    impl DocumentBuilder for TextBuilder {
        fn build(&self, outline: &FormOutline) -> Result<Bytes> {
            Ok(Bytes::from(outline.to_plain_text()))
        }
    }

    fn entry(name: &str, content_type: &str, size: u64) -> RemoteEntry {
        RemoteEntry {
            id: "id-1".to_string(),
            name: name.to_string(),
            kind: EntryKind::File,
            parent_ids: vec![],
            size,
            content_type: content_type.to_string(),
            modified_at: None,
        }
    }

    fn fetcher(source: Arc<StubSource>) -> ContentFetcher {
        ContentFetcher::new(source, 100, 1000, 3, Duration::ZERO)
    }

    #[test]
    fn test_final_names() {
        let fetcher = fetcher(Arc::new(StubSource::default()));

        let doc = entry("Plan: v2", "application/vnd.google-apps.document", 0);
        assert_eq!(fetcher.final_name(&doc), "Plan_ v2.docx");

        let sheet = entry("Budget", "application/vnd.google-apps.spreadsheet", 0);
        assert_eq!(fetcher.final_name(&sheet), "Budget.xlsx");

        let form = entry("Survey", FORM_MIME, 0);
        assert_eq!(fetcher.final_name(&form), "Survey_form.docx");

        let pdf = entry("scan.pdf", "application/pdf", 10);
        assert_eq!(fetcher.final_name(&pdf), "scan.pdf");

        let blank = entry("  ", "application/vnd.google-apps.document", 0);
        assert_eq!(fetcher.final_name(&blank), "untitled.docx");
    }

    #[test]
    fn test_unsupported_entries() {
        let plain = fetcher(Arc::new(StubSource::default()));

        assert!(!plain.is_supported(&entry("Script", "application/vnd.google-apps.script", 0)));
        assert!(!plain.is_supported(&entry("Survey", FORM_MIME, 0)));
        assert!(!plain.is_supported(&entry("huge.iso", "application/octet-stream", 1001)));
        assert!(plain.is_supported(&entry("ok.iso", "application/octet-stream", 1000)));

        let with_builder = fetcher(Arc::new(StubSource::default()))
            .with_document_builder(Arc::new(TextBuilder));
        assert!(with_builder.is_supported(&entry("Survey", FORM_MIME, 0)));
    }

    #[tokio::test]
    async fn test_export_too_large_skips_transfer() {
        let source = Arc::new(StubSource {
            size: Some(101),
            ..StubSource::default()
        });

        let err = fetcher(source.clone())
            .fetch(
                &entry("Big", "application/vnd.google-apps.document", 0),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::ExportTooLarge);
        assert_eq!(source.export_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_size_query_does_not_block_export() {
        let source = Arc::new(StubSource {
            size_fails: true,
            ..StubSource::default()
        });

        let content = fetcher(source.clone())
            .fetch(
                &entry("Deck", "application/vnd.google-apps.presentation", 0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(content.name, "Deck.pptx");
        assert_eq!(source.size_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_export_failures_are_retried() {
        let source = Arc::new(StubSource {
            export_failures: Mutex::new(vec![
                BridgeError::remote(TransferErrorKind::NetworkTransient, "timeout"),
                BridgeError::remote(TransferErrorKind::BackendTemporary, "500"),
            ]),
            ..StubSource::default()
        });

        let content = fetcher(source.clone())
            .fetch(
                &entry("Doc", "application/vnd.google-apps.document", 0),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(source.export_calls.load(Ordering::SeqCst), 3);
        assert_eq!(content.into_bytes().await.unwrap(), Bytes::from(DOCX_MIME));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let source = Arc::new(StubSource {
            export_failures: Mutex::new(vec![BridgeError::remote(
                TransferErrorKind::PermissionDenied,
                "403",
            )]),
            ..StubSource::default()
        });

        let err = fetcher(source.clone())
            .fetch(
                &entry("Doc", "application/vnd.google-apps.document", 0),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::PermissionDenied);
        assert_eq!(source.export_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_form_goes_through_builder() {
        let content = fetcher(Arc::new(StubSource::default()))
            .with_document_builder(Arc::new(TextBuilder))
            .fetch(&entry("Poll", FORM_MIME, 0), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(content.name, "Poll_form.docx");
        let text = content.into_bytes().await.unwrap();
        assert!(std::str::from_utf8(&text).unwrap().contains("1. Name"));
    }

    #[tokio::test]
    async fn test_download_streams_raw_bytes() {
        let content = fetcher(Arc::new(StubSource::default()))
            .fetch(&entry("a.bin", "application/octet-stream", 9), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(content.size, 9);
        assert!(matches!(content.body, ContentBody::Stream(_)));
        assert_eq!(content.into_bytes().await.unwrap(), Bytes::from_static(b"raw bytes"));
    }
}
