//! # Progress Events
//!
//! Typed progress events delivered from the migration worker to the host over a
//! bounded `tokio::sync::mpsc` channel.
//!
//! ## Overview
//!
//! - **Event Types**: [`MigrationEvent`] covers run lifecycle, per-entry
//!   progress, per-chunk file progress and entry failures
//! - **ProgressSender**: the worker's end; cheap to clone
//! - **ProgressReceiver**: the presentation end, drained on the host's schedule
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  emit / try_emit  ┌──────────────┐      recv      ┌──────────┐
//! │ Orchestrator ├──────────────────>│ mpsc (bounded)├──────────────>│ Host UI  │
//! └──────────────┘                   └──────────────┘                └──────────┘
//! ```
//!
//! ## Back-pressure
//!
//! Run-level and per-entry events use [`ProgressSender::emit`], which waits for
//! capacity so the host never misses a state change. Per-chunk
//! [`MigrationEvent::FileProgress`] uses [`ProgressSender::try_emit`] and is
//! dropped when the queue is full; the next chunk supersedes it anyway.
//!
//! A dropped receiver never stops a migration: sends to a closed channel are
//! discarded.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{progress_channel, MigrationEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let (sender, mut receiver) = progress_channel(16);
//!
//! sender
//!     .emit(MigrationEvent::GlobalProgress {
//!         processed: 1,
//!         total: 4,
//!         current_name: "report.pdf".to_string(),
//!     })
//!     .await;
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.percent(), Some(25));
//! # }
//! ```

use bridge_traits::error::TransferErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::trace;

/// Default capacity for the progress channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Event Types
// ============================================================================

/// Aggregate counters for a run, as reported to the host and stored in the
/// progress ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub total_files: u64,
    pub migrated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total_size: u64,
    pub migrated_size: u64,
    pub duration_secs: u64,
}

/// Progress event emitted by a migration run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum MigrationEvent {
    /// Enumeration finished and transfers are about to start.
    RunStarted {
        run_id: String,
        total_entries: u64,
        total_bytes: u64,
    },
    /// An entry reached a terminal state.
    GlobalProgress {
        processed: u64,
        total: u64,
        /// Name of the entry just processed; empty on the final 100% event.
        current_name: String,
    },
    /// Bytes acknowledged by the destination for the current file.
    FileProgress {
        bytes_sent: u64,
        total_bytes: u64,
        current_name: String,
    },
    /// An entry failed after its retry budget.
    EntryFailed {
        path: String,
        kind: TransferErrorKind,
        message: String,
    },
    /// Run finished normally.
    RunCompleted { run_id: String, stats: RunSummary },
    /// Run stopped on a fatal connectivity failure.
    RunAborted {
        run_id: String,
        message: String,
        processed: u64,
    },
    /// Run stopped on user request.
    RunCancelled { run_id: String, processed: u64 },
}

impl MigrationEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            MigrationEvent::RunStarted { .. } => "Migration started",
            MigrationEvent::GlobalProgress { .. } => "Migration in progress",
            MigrationEvent::FileProgress { .. } => "Uploading file",
            MigrationEvent::EntryFailed { .. } => "File migration failed",
            MigrationEvent::RunCompleted { .. } => "Migration completed",
            MigrationEvent::RunAborted { .. } => "Migration aborted",
            MigrationEvent::RunCancelled { .. } => "Migration cancelled",
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            MigrationEvent::RunAborted { .. } => EventSeverity::Error,
            MigrationEvent::EntryFailed { .. } | MigrationEvent::RunCancelled { .. } => {
                EventSeverity::Warning
            }
            MigrationEvent::RunStarted { .. } | MigrationEvent::RunCompleted { .. } => {
                EventSeverity::Info
            }
            _ => EventSeverity::Debug,
        }
    }

    /// Completion percentage for progress events, clamped to 0-100.
    pub fn percent(&self) -> Option<u8> {
        let (done, total) = match self {
            MigrationEvent::GlobalProgress {
                processed, total, ..
            } => (*processed, *total),
            MigrationEvent::FileProgress {
                bytes_sent,
                total_bytes,
                ..
            } => (*bytes_sent, *total_bytes),
            _ => return None,
        };

        if total == 0 {
            return Some(100);
        }
        Some(((done.min(total) as f64 / total as f64) * 100.0) as u8)
    }

    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationEvent::RunCompleted { .. }
                | MigrationEvent::RunAborted { .. }
                | MigrationEvent::RunCancelled { .. }
        )
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Channel
// ============================================================================

/// Creates a bounded progress channel.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::progress_channel;
///
/// let (sender, receiver) = progress_channel(100);
/// ```
pub fn progress_channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        ProgressSender { tx },
        ProgressReceiver {
            rx,
            filter: None,
        },
    )
}

/// Worker side of the progress channel.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<MigrationEvent>,
}

impl ProgressSender {
    /// A sender whose receiver is already gone; every event is discarded.
    ///
    /// For hosts that do not observe progress.
    pub fn detached() -> Self {
        let (sender, _receiver) = progress_channel(1);
        sender
    }

    /// Sends an event, waiting for capacity.
    ///
    /// Returns `false` if the receiver has been dropped.
    pub async fn emit(&self, event: MigrationEvent) -> bool {
        match self.tx.send(event).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                trace!(event = event.description(), "Progress receiver closed");
                false
            }
        }
    }

    /// Sends an event only if there is room right now.
    ///
    /// Returns `false` if the event was dropped.
    pub fn try_emit(&self, event: MigrationEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                trace!(event = event.description(), "Progress queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSender")
            .field("capacity", &self.tx.capacity())
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&MigrationEvent) -> bool + Send + Sync>;

/// Presentation side of the progress channel, with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{progress_channel, EventSeverity};
///
/// let (_sender, receiver) = progress_channel(100);
///
/// // Only surface warnings and errors
/// let alerts = receiver.filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct ProgressReceiver {
    rx: mpsc::Receiver<MigrationEvent>,
    filter: Option<EventFilter>,
}

impl ProgressReceiver {
    /// Adds a filter function to this receiver.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&MigrationEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &MigrationEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// Returns `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<MigrationEvent> {
        loop {
            let event = self.rx.recv().await?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }

    /// Attempts to receive an event without waiting.
    ///
    /// Returns `None` if no matching event is currently queued.
    pub fn try_recv(&mut self) -> Option<MigrationEvent> {
        loop {
            let event = self.rx.try_recv().ok()?;
            if self.accepts(&event) {
                return Some(event);
            }
        }
    }
}

impl fmt::Debug for ProgressReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReceiver")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
