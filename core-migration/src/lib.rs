//! # Migration Engine
//!
//! Resumable one-way transfer of a source drive tree to a destination drive.
//!
//! ## Overview
//!
//! A run enumerates the source once, then transfers files one at a time:
//! - Skipping anything the progress ledger already records
//! - Exporting native documents to office formats
//! - Uploading small files in one request and large files in chunks
//! - Retrying transient failures and aborting on lost connectivity
//! - Logging every failed file with its destination path
//!
//! ## Components
//!
//! - **Progress Ledger** (`ledger`): Durable set of confirmed transfers
//! - **Error Log** (`error_log`): Append-only record of failed files
//! - **Remote Tree Enumerator** (`tree`): Paginated listing and path reconstruction
//! - **Content Fetcher** (`fetcher`): Download, export and questionnaire rendering
//! - **Resumable Upload Engine** (`upload`): Folder creation, simple and chunked uploads
//! - **Retry Controller** (`retry`): Linear backoff over the error taxonomy
//! - **Run State Machine** (`job`): Run and entry lifecycles, statistics
//! - **Migration Orchestrator** (`orchestrator`): Drives a run end to end
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_migration::MigrationOrchestrator;
//! use core_runtime::events::progress_channel;
//! use tokio_util::sync::CancellationToken;
//!
//! let (events, mut progress) = progress_channel(config.event_channel_capacity);
//! let orchestrator = MigrationOrchestrator::new(config, drive, onedrive, events);
//!
//! let cancel = CancellationToken::new();
//! let run = orchestrator.run(cancel.clone()).await?;
//! println!("{} migrated", run.stats.migrated);
//! ```

pub mod error;
pub mod error_log;
pub mod fetcher;
pub mod form;
pub mod job;
pub mod ledger;
pub mod orchestrator;
pub mod retry;
pub mod sanitize;
pub mod tree;
pub mod upload;

pub use error::{MigrationError, Result};
pub use error_log::{ErrorLog, ErrorRecord};
pub use fetcher::{ContentBody, ContentFetcher, FetchedContent};
pub use form::{AnswerLayout, DocumentBuilder, FormOutline, OutlineOption, OutlineQuestion};
pub use job::{EntryState, MigrationRun, MigrationStats, RunId, RunProgress, RunStatus};
pub use ledger::ProgressLedger;
pub use orchestrator::MigrationOrchestrator;
pub use retry::{AttemptError, RetryController};
pub use sanitize::{format_size, sanitize_filename};
pub use tree::{resolve_path, RemoteTree, TreeEnumerator};
pub use upload::{UploadEngine, UploadOutcome, UploadSession};

pub use tokio_util::sync::CancellationToken;
