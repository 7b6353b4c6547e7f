//! # Migration Orchestrator
//!
//! Top-level driver of a run: enumerate once, then walk the files in listing
//! order, one at a time.
//!
//! ## Workflow
//!
//! ```text
//! load ledger ─► enumerate ─► for each file:
//!                               cancelled?          → stop (Cancelled)
//!                               in ledger?          → SkippedDone
//!                               unsupported?        → SkippedUnsupported
//!                               resolve path ─► retry { ensure folder ─► fetch ─► upload }
//!                                  ok               → Succeeded, ledger flush
//!                                  failed           → Failed, error log
//!                                  fatal            → flush, stop (Aborted)
//!                             ─► final flush ─► 100% ─► Completed
//! ```
//!
//! The ledger is flushed after every successful file, so an interrupted run
//! resumes from the last confirmed transfer. Cancellation is polled before
//! each file and, through the upload engine, before each chunk.

use bridge_traits::storage::{RemoteEntry, RemoteTreeSource, UploadDestination};
use core_runtime::config::MigrationConfig;
use core_runtime::events::{MigrationEvent, ProgressSender};
use core_runtime::logging::strip_path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{MigrationError, Result};
use crate::error_log::ErrorLog;
use crate::fetcher::ContentFetcher;
use crate::form::DocumentBuilder;
use crate::job::{EntryState, MigrationRun};
use crate::ledger::ProgressLedger;
use crate::retry::{AttemptError, RetryController};
use crate::tree::{RemoteTree, TreeEnumerator};
use crate::upload::UploadEngine;

/// How a single file ended.
enum EntryOutcome {
    Done(EntryState),
    Abort(MigrationError),
    Cancelled,
}

pub struct MigrationOrchestrator {
    config: MigrationConfig,
    source: Arc<dyn RemoteTreeSource>,
    destination: Arc<dyn UploadDestination>,
    events: ProgressSender,
    builder: Option<Arc<dyn DocumentBuilder>>,
}

/// Per-run collaborators, built fresh by [`MigrationOrchestrator::run`].
struct RunContext {
    ledger: ProgressLedger,
    error_log: ErrorLog,
    retry: RetryController,
    fetcher: ContentFetcher,
    uploader: UploadEngine,
    cancel: CancellationToken,
}

impl MigrationOrchestrator {
    pub fn new(
        config: MigrationConfig,
        source: Arc<dyn RemoteTreeSource>,
        destination: Arc<dyn UploadDestination>,
        events: ProgressSender,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            events,
            builder: None,
        }
    }

    /// Enable questionnaire transfer through `builder`.
    pub fn with_document_builder(mut self, builder: Arc<dyn DocumentBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Run one migration to completion, abort or cancellation.
    ///
    /// # Returns
    ///
    /// The finished run, with status `Completed` or `Cancelled`.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::Aborted`] on fatal connectivity loss; the ledger
    ///   holds every transfer confirmed before the failure
    /// - ledger load/flush failures and invalid configuration
    /// - an enumeration failure that outlived its retries
    #[instrument(skip_all)]
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationRun> {
        self.config.validate()?;

        let mut ctx = self.context(cancel).await?;
        let run = MigrationRun::new();

        let tree = match TreeEnumerator::new(self.source.clone(), ctx.retry.clone())
            .enumerate()
            .await
        {
            Ok(tree) => tree,
            Err(MigrationError::Cancelled) => {
                let run = run.cancel()?;
                self.emit(MigrationEvent::RunCancelled {
                    run_id: run.id.as_str(),
                    processed: 0,
                })
                .await;
                return Ok(run);
            }
            Err(e) if e.kind().is_fatal_connectivity() => {
                let message = e.user_message();
                error!(error = %e, "Source unreachable during enumeration");
                self.emit(MigrationEvent::RunAborted {
                    run_id: run.id.as_str(),
                    message: message.clone(),
                    processed: 0,
                })
                .await;
                return Err(MigrationError::Aborted { message });
            }
            Err(e) => return Err(e),
        };

        let mut run = run.start(tree.file_count() as u64, tree.total_bytes())?;
        info!(run_id = %run.id, files = tree.file_count(), "Migration started");
        self.emit(MigrationEvent::RunStarted {
            run_id: run.id.as_str(),
            total_entries: tree.file_count() as u64,
            total_bytes: tree.total_bytes(),
        })
        .await;

        for entry in tree.files() {
            if ctx.cancel.is_cancelled() {
                return self.finish_cancelled(run, &ctx).await;
            }

            match self.process_entry(&mut run, &mut ctx, &tree, entry).await? {
                EntryOutcome::Done(state) => {
                    debug!(id = %entry.id, state = state.as_str(), "Entry finished");
                }
                EntryOutcome::Cancelled => return self.finish_cancelled(run, &ctx).await,
                EntryOutcome::Abort(error) => return self.finish_aborted(run, &ctx, error).await,
            }

            run.advance();
            self.emit(MigrationEvent::GlobalProgress {
                processed: run.progress.processed,
                total: run.progress.total,
                current_name: entry.name.clone(),
            })
            .await;
        }

        ctx.ledger.flush(&run.summary()).await?;
        self.emit(MigrationEvent::GlobalProgress {
            processed: run.progress.total,
            total: run.progress.total,
            current_name: String::new(),
        })
        .await;

        let run = run.complete()?;
        let stats = run.summary();
        info!(
            migrated = stats.migrated,
            skipped = stats.skipped,
            errors = stats.errors,
            "Migration completed"
        );
        self.emit(MigrationEvent::RunCompleted {
            run_id: run.id.as_str(),
            stats,
        })
        .await;

        Ok(run)
    }

    async fn context(&self, cancel: CancellationToken) -> Result<RunContext> {
        let fs = self.config.file_system.clone();
        let ledger = ProgressLedger::load(fs.clone(), self.config.ledger_path.clone()).await?;

        let mut fetcher = ContentFetcher::from_config(&self.config, self.source.clone());
        if let Some(builder) = &self.builder {
            fetcher = fetcher.with_document_builder(builder.clone());
        }

        Ok(RunContext {
            ledger,
            error_log: ErrorLog::new(fs, self.config.error_log_path.clone()),
            retry: RetryController::from_config(&self.config, cancel.clone()),
            fetcher,
            uploader: UploadEngine::from_config(
                &self.config,
                self.destination.clone(),
                self.events.clone(),
            ),
            cancel,
        })
    }

    async fn process_entry(
        &self,
        run: &mut MigrationRun,
        ctx: &mut RunContext,
        tree: &RemoteTree,
        entry: &RemoteEntry,
    ) -> Result<EntryOutcome> {
        let state = EntryState::Pending;

        if self.config.skip_existing && ctx.ledger.contains(&entry.id) {
            run.stats.record_skip();
            return Ok(EntryOutcome::Done(state.transition(EntryState::SkippedDone)?));
        }

        if let Some(reason) = ctx.fetcher.unsupported_reason(entry) {
            info!(name = %entry.name, %reason, "Skipping unsupported entry");
            run.stats.record_skip();
            return Ok(EntryOutcome::Done(
                state.transition(EntryState::SkippedUnsupported)?,
            ));
        }

        let final_name = ctx.fetcher.final_name(entry);
        let mut folder = self.config.destination_segments();

        match tree.folder_path_for(entry, self.config.max_folder_depth) {
            Ok(segments) => folder.extend(segments),
            Err(e) => {
                let path = join_path(&folder, Some(&final_name));
                self.record_failure(run, ctx, &path, &e).await;
                return Ok(EntryOutcome::Done(state.transition(EntryState::Failed)?));
            }
        }

        let folder_path = join_path(&folder, None);
        let dest_path = join_path(&folder, Some(&final_name));
        let state = state.transition(EntryState::InProgress)?;

        let fetcher = &ctx.fetcher;
        let uploader = &ctx.uploader;
        let cancel = &ctx.cancel;
        let folder_ref = folder_path.as_str();
        let dest_ref = dest_path.as_str();

        let result = ctx
            .retry
            .attempt(dest_ref, move || async move {
                uploader.ensure_folder(folder_ref).await?;
                let content = fetcher.fetch(entry, cancel).await?;
                uploader.upload(content, dest_ref, cancel).await
            })
            .await;

        match result {
            Ok(outcome) => {
                ctx.ledger.mark_complete(entry.id.clone());
                run.stats.record_success(outcome.bytes());
                ctx.ledger.flush(&run.summary()).await?;
                debug!(path = %dest_path, bytes = outcome.bytes(), "Transferred");
                Ok(EntryOutcome::Done(state.transition(EntryState::Succeeded)?))
            }
            Err(AttemptError::Failed { error, retries }) => {
                debug!(retries, "Retries exhausted");
                self.record_failure(run, ctx, &dest_path, &error).await;
                Ok(EntryOutcome::Done(state.transition(EntryState::Failed)?))
            }
            Err(AttemptError::Abort(error)) => {
                run.stats.record_failure();
                self.append_error_log(ctx, &dest_path, &error).await;
                Ok(EntryOutcome::Abort(error))
            }
            Err(AttemptError::Cancelled) => Ok(EntryOutcome::Cancelled),
        }
    }

    async fn record_failure(
        &self,
        run: &mut MigrationRun,
        ctx: &RunContext,
        path: &str,
        error: &MigrationError,
    ) {
        warn!(%path, error = %error, "Entry failed");
        run.stats.record_failure();
        self.append_error_log(ctx, path, error).await;
        self.emit(MigrationEvent::EntryFailed {
            path: path.to_string(),
            kind: error.kind(),
            message: error.user_message(),
        })
        .await;
    }

    async fn append_error_log(&self, ctx: &RunContext, path: &str, error: &MigrationError) {
        if let Err(e) = ctx.error_log.append(path, &error.user_message()).await {
            error!(
                log = %strip_path(&self.config.error_log_path.to_string_lossy()),
                error = %e,
                "Could not write error log"
            );
        }
    }

    async fn finish_cancelled(&self, run: MigrationRun, ctx: &RunContext) -> Result<MigrationRun> {
        ctx.ledger.flush(&run.summary()).await?;
        let run = run.cancel()?;
        info!(processed = run.progress.processed, "Migration cancelled");
        self.emit(MigrationEvent::RunCancelled {
            run_id: run.id.as_str(),
            processed: run.progress.processed,
        })
        .await;
        Ok(run)
    }

    async fn finish_aborted(
        &self,
        run: MigrationRun,
        ctx: &RunContext,
        cause: MigrationError,
    ) -> Result<MigrationRun> {
        ctx.ledger.flush(&run.summary()).await?;
        let message = cause.user_message();
        let run = run.abort(message.clone())?;
        error!(error = %cause, processed = run.progress.processed, "Migration aborted");
        self.emit(MigrationEvent::RunAborted {
            run_id: run.id.as_str(),
            message: message.clone(),
            processed: run.progress.processed,
        })
        .await;
        Err(MigrationError::Aborted { message })
    }

    async fn emit(&self, event: MigrationEvent) {
        self.events.emit(event).await;
    }
}

fn join_path(folder: &[String], name: Option<&str>) -> String {
    folder
        .iter()
        .map(String::as_str)
        .chain(name)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        let folder = vec!["Backup".to_string(), "Docs".to_string()];
        assert_eq!(join_path(&folder, Some("a.pdf")), "Backup/Docs/a.pdf");
        assert_eq!(join_path(&folder, None), "Backup/Docs");
        assert_eq!(join_path(&[], Some("a.pdf")), "a.pdf");
        assert_eq!(join_path(&[], None), "");
    }
}
