//! # Migration Run State Machine
//!
//! Lifecycle of a run and of each entry within it, with validated
//! transitions.
//!
//! ## Run
//!
//! ```text
//! Pending → Running → Completed
//!              ↓
//!              ├──→ Aborted     (fatal connectivity)
//!              └──→ Cancelled   (user request)
//! ```
//!
//! ## Entry
//!
//! ```text
//! Pending ─┬─→ SkippedDone
//!          ├─→ SkippedUnsupported
//!          └─→ InProgress ─┬─→ Succeeded
//!                          └─→ Failed
//! ```

use chrono::{DateTime, Utc};
use core_runtime::events::RunSummary;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{MigrationError, Result};

// ============================================================================
// ID Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    /// Stopped on a fatal connectivity failure
    Aborted,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Aborted | RunStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for RunStatus {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "aborted" => Ok(RunStatus::Aborted),
            "cancelled" => Ok(RunStatus::Cancelled),
            _ => Err(MigrationError::InvalidStateTransition {
                from: s.to_string(),
                to: "parse".to_string(),
            }),
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-entry state within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    /// Already in the progress ledger
    SkippedDone,
    /// Folder, non-exportable native type or over the size limit
    SkippedUnsupported,
    InProgress,
    Succeeded,
    Failed,
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EntryState::Pending | EntryState::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::SkippedDone => "skipped_done",
            EntryState::SkippedUnsupported => "skipped_unsupported",
            EntryState::InProgress => "in_progress",
            EntryState::Succeeded => "succeeded",
            EntryState::Failed => "failed",
        }
    }

    /// Move to `to`, rejecting transitions the entry state machine forbids.
    pub fn transition(self, to: EntryState) -> Result<EntryState> {
        let valid = matches!(
            (self, to),
            (EntryState::Pending, EntryState::SkippedDone)
                | (EntryState::Pending, EntryState::SkippedUnsupported)
                | (EntryState::Pending, EntryState::InProgress)
                // unresolvable path, detected before any transfer
                | (EntryState::Pending, EntryState::Failed)
                | (EntryState::InProgress, EntryState::Succeeded)
                | (EntryState::InProgress, EntryState::Failed)
        );

        if valid {
            Ok(to)
        } else {
            Err(MigrationError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

// ============================================================================
// Progress & Stats
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProgress {
    pub processed: u64,
    pub total: u64,
}

impl RunProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed.min(self.total) as f64 / self.total as f64) * 100.0) as u8
    }
}

/// Counters collected while a run progresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    pub total_files: u64,
    pub migrated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total_size: u64,
    pub migrated_size: u64,
}

impl MigrationStats {
    pub fn record_success(&mut self, bytes: u64) {
        self.migrated += 1;
        self.migrated_size += bytes;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self) {
        self.errors += 1;
    }

    pub fn summary(&self, duration: Duration) -> RunSummary {
        RunSummary {
            total_files: self.total_files,
            migrated: self.migrated,
            skipped: self.skipped,
            errors: self.errors,
            total_size: self.total_size,
            migrated_size: self.migrated_size,
            duration_secs: duration.as_secs(),
        }
    }
}

// ============================================================================
// Run Entity
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRun {
    pub id: RunId,
    pub status: RunStatus,
    pub progress: RunProgress,
    pub stats: MigrationStats,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationRun {
    pub fn new() -> Self {
        Self {
            id: RunId::new(),
            status: RunStatus::Pending,
            progress: RunProgress::default(),
            stats: MigrationStats::default(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// # Errors
    ///
    /// Returns an error if the run is not `Pending`.
    pub fn start(mut self, total_files: u64, total_size: u64) -> Result<Self> {
        self.validate_transition(RunStatus::Running)?;
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.progress.total = total_files;
        self.stats.total_files = total_files;
        self.stats.total_size = total_size;
        Ok(self)
    }

    pub fn complete(mut self) -> Result<Self> {
        self.validate_transition(RunStatus::Completed)?;
        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(self)
    }

    pub fn abort(mut self, message: impl Into<String>) -> Result<Self> {
        self.validate_transition(RunStatus::Aborted)?;
        self.status = RunStatus::Aborted;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
        Ok(self)
    }

    pub fn cancel(mut self) -> Result<Self> {
        self.validate_transition(RunStatus::Cancelled)?;
        self.status = RunStatus::Cancelled;
        self.completed_at = Some(Utc::now());
        Ok(self)
    }

    /// Count one entry as processed.
    pub fn advance(&mut self) {
        self.progress.processed += 1;
    }

    /// Wall time since start; up to now while still running.
    pub fn elapsed(&self) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - start).to_std().unwrap_or_default()
    }

    pub fn summary(&self) -> RunSummary {
        self.stats.summary(self.elapsed())
    }

    fn validate_transition(&self, to: RunStatus) -> Result<()> {
        let valid = match (self.status, to) {
            (RunStatus::Pending, RunStatus::Running) => true,
            (RunStatus::Pending, RunStatus::Cancelled) => true,

            (RunStatus::Running, RunStatus::Completed) => true,
            (RunStatus::Running, RunStatus::Aborted) => true,
            (RunStatus::Running, RunStatus::Cancelled) => true,

            _ => false,
        };

        if !valid {
            return Err(MigrationError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        Ok(())
    }
}

impl Default for MigrationRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_lifecycle() {
        let run = MigrationRun::new();
        assert_eq!(run.status, RunStatus::Pending);

        let mut run = run.start(4, 1024).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.progress.total, 4);
        assert!(run.started_at.is_some());

        run.advance();
        run.stats.record_success(512);
        assert_eq!(run.progress.percent(), 25);

        let run = run.complete().unwrap();
        assert!(run.status.is_terminal());
        assert_eq!(run.summary().migrated_size, 512);
    }

    #[test]
    fn test_invalid_run_transitions() {
        let run = MigrationRun::new();
        assert!(run.clone().complete().is_err());
        assert!(run.clone().abort("offline").is_err());

        let done = run.start(0, 0).unwrap().complete().unwrap();
        assert!(matches!(
            done.cancel(),
            Err(MigrationError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_abort_keeps_message() {
        let run = MigrationRun::new().start(1, 0).unwrap().abort("dns").unwrap();
        assert_eq!(run.status, RunStatus::Aborted);
        assert_eq!(run.error_message.as_deref(), Some("dns"));
    }

    #[test]
    fn test_entry_transitions() {
        let state = EntryState::Pending;
        assert_eq!(
            state.transition(EntryState::InProgress).unwrap(),
            EntryState::InProgress
        );
        assert!(EntryState::InProgress
            .transition(EntryState::Succeeded)
            .unwrap()
            .is_terminal());

        assert!(EntryState::Pending.transition(EntryState::Succeeded).is_err());
        assert!(EntryState::SkippedDone.transition(EntryState::InProgress).is_err());
        assert!(EntryState::Failed.transition(EntryState::Succeeded).is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("Aborted".parse::<RunStatus>().unwrap(), RunStatus::Aborted);
        assert!("bogus".parse::<RunStatus>().is_err());
    }

    #[test]
    fn test_empty_run_is_complete() {
        assert_eq!(RunProgress::default().percent(), 100);
    }
}
