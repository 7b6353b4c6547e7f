//! # Resumable Upload Engine
//!
//! Creates destination folders and uploads fetched content, choosing between
//! a single request and a chunked upload session by size.
//!
//! ## Chunked upload state machine
//!
//! ```text
//! NotStarted ─► SessionCreated ─► { ChunkSent ─► ChunkAcked }* ─► Completed
//!                     ▲                 │
//!                     └── AuthExpired ──┘  (re-authenticate, new session,
//!                                           resend from the current offset)
//! ```
//!
//! `bytes_acked` only moves after the destination accepted a chunk, and the
//! submitted ranges tile `[0, size)` with no gaps or overlaps. Cancellation
//! is checked before every chunk, so a cancelled transfer sends at most the
//! chunk already in flight.

use bridge_traits::error::TransferErrorKind;
use bridge_traits::http::ByteStream;
use bridge_traits::storage::{ChunkStatus, UploadDestination};
use bytes::Bytes;
use core_runtime::config::MigrationConfig;
use core_runtime::events::{MigrationEvent, ProgressSender};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{MigrationError, Result};
use crate::fetcher::FetchedContent;

/// In-memory state of one chunked upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub session_url: String,
    pub total_size: u64,
    pub bytes_acked: u64,
}

impl UploadSession {
    fn remaining(&self) -> u64 {
        self.total_size - self.bytes_acked
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Small { bytes: u64 },
    Chunked { bytes: u64, chunks: u32, sessions: u32 },
}

impl UploadOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            UploadOutcome::Small { bytes } | UploadOutcome::Chunked { bytes, .. } => *bytes,
        }
    }
}

pub struct UploadEngine {
    destination: Arc<dyn UploadDestination>,
    chunk_size: usize,
    threshold: u64,
    max_reauth: u32,
    events: ProgressSender,
    /// Folder paths known to exist in this run
    ensured: Mutex<HashSet<String>>,
}

impl UploadEngine {
    pub fn new(
        destination: Arc<dyn UploadDestination>,
        chunk_size: usize,
        threshold: u64,
        max_reauth: u32,
        events: ProgressSender,
    ) -> Self {
        Self {
            destination,
            chunk_size: chunk_size.max(1),
            threshold,
            max_reauth,
            events,
            ensured: Mutex::new(HashSet::new()),
        }
    }

    pub fn from_config(
        config: &MigrationConfig,
        destination: Arc<dyn UploadDestination>,
        events: ProgressSender,
    ) -> Self {
        Self::new(
            destination,
            config.chunk_size,
            config.large_file_threshold,
            config.max_reauth_attempts,
            events,
        )
    }

    /// Make sure every prefix of `path` exists as a folder.
    ///
    /// Creation races and name collisions are tolerated by the destination's
    /// conflict policy; an existing folder is success.
    #[instrument(skip(self))]
    pub async fn ensure_folder(&self, path: &str) -> Result<()> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut ensured = self.ensured.lock().await;
        let mut parent: Option<String> = None;

        for segment in segments {
            let prefix = match &parent {
                Some(p) => format!("{}/{}", p, segment),
                None => segment.to_string(),
            };

            if !ensured.contains(&prefix) {
                if !self.destination.item_exists(&prefix).await? {
                    debug!(folder = %prefix, "Creating folder");
                    self.destination
                        .create_folder(parent.as_deref(), segment)
                        .await?;
                }
                ensured.insert(prefix.clone());
            }

            parent = Some(prefix);
        }

        Ok(())
    }

    /// Upload `content` to `dest_path`.
    ///
    /// Payloads up to the large-file threshold go in one request; anything
    /// larger goes through an upload session.
    #[instrument(skip(self, content, cancel), fields(size = content.size))]
    pub async fn upload(
        &self,
        content: FetchedContent,
        dest_path: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome> {
        if cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        if content.size <= self.threshold {
            self.upload_small(content, dest_path).await
        } else {
            self.upload_chunked(content, dest_path, cancel).await
        }
    }

    async fn upload_small(&self, content: FetchedContent, dest_path: &str) -> Result<UploadOutcome> {
        let name = content.name.clone();
        let size = content.size;
        let data = content.into_bytes().await?;

        let got = data.len() as u64;
        if got < size {
            return Err(short_read(got, size));
        }
        if got > size {
            return Err(size_changed(size));
        }

        match self.destination.upload_small(dest_path, data.clone()).await {
            Ok(()) => {}
            Err(e) if e.kind() == TransferErrorKind::AuthExpired => {
                warn!("Credentials expired during upload, re-authenticating");
                self.destination.reauthenticate().await?;
                self.destination.upload_small(dest_path, data).await?;
            }
            Err(e) => return Err(e.into()),
        }

        self.events.try_emit(MigrationEvent::FileProgress {
            bytes_sent: size,
            total_bytes: size,
            current_name: name,
        });

        Ok(UploadOutcome::Small { bytes: size })
    }

    async fn upload_chunked(
        &self,
        content: FetchedContent,
        dest_path: &str,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome> {
        let name = content.name.clone();
        let mut session = UploadSession {
            session_url: self.destination.create_upload_session(dest_path).await?,
            total_size: content.size,
            bytes_acked: 0,
        };
        let mut reader = content.into_reader();
        let mut pending: Option<Bytes> = None;
        let mut chunks = 0u32;
        let mut sessions = 1u32;
        let mut reauths = 0u32;

        while session.bytes_acked < session.total_size {
            if cancel.is_cancelled() {
                info!(acked = session.bytes_acked, "Upload cancelled between chunks");
                return Err(MigrationError::Cancelled);
            }

            let chunk = match pending.take() {
                Some(chunk) => chunk,
                None => {
                    let len = session.remaining().min(self.chunk_size as u64) as usize;
                    let chunk =
                        read_chunk(&mut reader, len, session.bytes_acked, session.total_size)
                            .await?;
                    if session.bytes_acked + len as u64 == session.total_size {
                        ensure_drained(&mut reader, session.total_size).await?;
                    }
                    chunk
                }
            };

            let start = session.bytes_acked;
            let end = start + chunk.len() as u64 - 1;

            match self
                .destination
                .upload_chunk(&session.session_url, start, end, session.total_size, chunk.clone())
                .await
            {
                Ok(status) => {
                    session.bytes_acked = end + 1;
                    chunks += 1;

                    if status == ChunkStatus::Completed && session.bytes_acked < session.total_size {
                        warn!(acked = session.bytes_acked, "Destination completed the upload early");
                        return Err(MigrationError::transfer(
                            TransferErrorKind::Unknown,
                            format!(
                                "Destination closed the upload session after {} of {} bytes",
                                session.bytes_acked, session.total_size
                            ),
                        ));
                    }

                    self.events.try_emit(MigrationEvent::FileProgress {
                        bytes_sent: session.bytes_acked,
                        total_bytes: session.total_size,
                        current_name: name.clone(),
                    });
                }
                Err(e) if e.kind() == TransferErrorKind::AuthExpired && reauths < self.max_reauth => {
                    reauths += 1;
                    warn!(
                        offset = start,
                        attempt = reauths,
                        "Session authorization expired, re-authenticating"
                    );
                    self.destination.reauthenticate().await?;
                    session.session_url = self.destination.create_upload_session(dest_path).await?;
                    sessions += 1;
                    pending = Some(chunk);
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(chunks, sessions, "Chunked upload complete");
        Ok(UploadOutcome::Chunked {
            bytes: session.total_size,
            chunks,
            sessions,
        })
    }
}

async fn read_chunk(reader: &mut ByteStream, len: usize, offset: u64, total: u64) -> Result<Bytes> {
    let mut buffer = vec![0u8; len];
    reader.read_exact(&mut buffer).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            short_read(offset, total)
        } else {
            MigrationError::transfer(TransferErrorKind::NetworkTransient, e.to_string())
        }
    })?;
    Ok(Bytes::from(buffer))
}

/// Fail if the source still has bytes once `total` have been read.
async fn ensure_drained(reader: &mut ByteStream, total: u64) -> Result<()> {
    let mut probe = [0u8; 1];
    let extra = reader
        .read(&mut probe)
        .await
        .map_err(|e| MigrationError::transfer(TransferErrorKind::NetworkTransient, e.to_string()))?;
    if extra > 0 {
        return Err(size_changed(total));
    }
    Ok(())
}

/// The source holds more than its listed size; fetching again will not help.
fn size_changed(expected: u64) -> MigrationError {
    MigrationError::transfer(
        TransferErrorKind::Unknown,
        format!("Source size changed: expected {} bytes", expected),
    )
}

fn short_read(got: u64, expected: u64) -> MigrationError {
    MigrationError::transfer(
        TransferErrorKind::NetworkTransient,
        format!("Source stream ended after {} of {} bytes", got, expected),
    )
}

impl std::fmt::Debug for UploadEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadEngine")
            .field("chunk_size", &self.chunk_size)
            .field("threshold", &self.threshold)
            .field("max_reauth", &self.max_reauth)
            .finish()
    }
}
