//! # Retry / Backoff Controller
//!
//! Runs one unit of work (an entry transfer, a listing page) under a bounded
//! attempt budget.
//!
//! | Kind | Outcome |
//! |------|---------|
//! | `NetworkTransient`, `RateLimited`, `BackendTemporary` | retried, sleeping `base * n` before retry `n` |
//! | `NetworkFatal` | [`AttemptError::Abort`] at once |
//! | anything else | [`AttemptError::Failed`] at once |
//!
//! Backoff sleeps end early when the run is cancelled.

use core_runtime::config::MigrationConfig;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MigrationError, Result};

#[derive(Debug)]
pub enum AttemptError {
    /// Gave up on this unit of work; the run continues.
    Failed {
        error: MigrationError,
        /// Retries performed before giving up (0 when the first failure was final)
        retries: u32,
    },
    /// Connectivity is gone; the run must stop.
    Abort(MigrationError),
    Cancelled,
}

impl AttemptError {
    pub fn into_error(self) -> MigrationError {
        match self {
            AttemptError::Failed { error, .. } | AttemptError::Abort(error) => error,
            AttemptError::Cancelled => MigrationError::Cancelled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: u32,
    backoff_base: Duration,
    cancel: CancellationToken,
}

impl RetryController {
    pub fn new(max_attempts: u32, backoff_base: Duration, cancel: CancellationToken) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            cancel,
        }
    }

    pub fn from_config(config: &MigrationConfig, cancel: CancellationToken) -> Self {
        Self::new(config.max_retries, config.backoff_base, cancel)
    }

    /// Delay before retry `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff_base.saturating_mul(retry)
    }

    pub async fn attempt<T, F, Fut>(&self, label: &str, mut op: F) -> std::result::Result<T, AttemptError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(AttemptError::Cancelled);
            }

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(MigrationError::Cancelled) => return Err(AttemptError::Cancelled),
                Err(error) => error,
            };

            let kind = error.kind();
            if kind.is_fatal_connectivity() {
                warn!(label, %kind, "Fatal connectivity failure");
                return Err(AttemptError::Abort(error));
            }

            if !kind.is_retryable() || retries + 1 >= self.max_attempts {
                debug!(label, %kind, retries, "Giving up");
                return Err(AttemptError::Failed { error, retries });
            }

            retries += 1;
            let delay = self.delay_for(retries);
            warn!(
                label,
                %kind,
                "Attempt {}/{} failed, retrying in {:?}",
                retries,
                self.max_attempts,
                delay
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(AttemptError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::TransferErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn failing(kind: TransferErrorKind) -> Result<()> {
        Err(MigrationError::transfer(kind, "boom"))
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let retry = RetryController::new(3, Duration::ZERO, CancellationToken::new());
        let value = retry.attempt("ok", || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_transient_is_retried_until_budget() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry = RetryController::new(3, Duration::ZERO, CancellationToken::new());

        let counter = calls.clone();
        let err = retry
            .attempt("transient", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { failing(TransferErrorKind::NetworkTransient) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, AttemptError::Failed { retries: 2, .. }));
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let retry = RetryController::new(3, Duration::ZERO, CancellationToken::new());

        let counter = calls.clone();
        let value = retry
            .attempt("throttled", || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(MigrationError::transfer(TransferErrorKind::RateLimited, "429"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let retry = RetryController::new(3, Duration::ZERO, CancellationToken::new());

        let err = retry
            .attempt("export", || async { failing(TransferErrorKind::ExportTooLarge) })
            .await
            .unwrap_err();

        match err {
            AttemptError::Failed { error, retries } => {
                assert_eq!(retries, 0);
                assert_eq!(error.kind(), TransferErrorKind::ExportTooLarge);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_fatal_aborts() {
        let retry = RetryController::new(3, Duration::ZERO, CancellationToken::new());

        let err = retry
            .attempt("dns", || async { failing(TransferErrorKind::NetworkFatal) })
            .await
            .unwrap_err();

        assert!(matches!(err, AttemptError::Abort(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let retry = RetryController::new(5, Duration::from_secs(3600), cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = retry
            .attempt("slow", || async { failing(TransferErrorKind::BackendTemporary) })
            .await
            .unwrap_err();

        assert!(matches!(err, AttemptError::Cancelled));
    }

    #[test]
    fn test_linear_backoff() {
        let retry = RetryController::new(3, Duration::from_secs(2), CancellationToken::new());
        assert_eq!(retry.delay_for(1), Duration::from_secs(2));
        assert_eq!(retry.delay_for(2), Duration::from_secs(4));
    }
}
