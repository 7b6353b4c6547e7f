//! # Credentials
//!
//! Bearer-token access for provider connectors.
//!
//! ## Overview
//!
//! Connectors ask a [`CredentialProvider`] for a token before every request
//! and call [`CredentialProvider::reauthenticate`] after the provider rejects
//! one. Interactive sign-in is the host's business: it plugs in a
//! [`TokenSource`], and [`TokenManager`] caches what the source returns,
//! refreshing ahead of expiry.
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{ProviderKind, TokenManager, TokenSource, OAuthTokens, CredentialProvider};
//! use std::sync::Arc;
//! # struct BrowserFlow;
//! # #[async_trait::async_trait]
//! # impl TokenSource for BrowserFlow {
//! #     async fn acquire(&self, _: ProviderKind, _: Option<String>) -> core_auth::Result<OAuthTokens> {
//! #         Ok(OAuthTokens::new("token".into(), None, 3600))
//! #     }
//! # }
//!
//! # #[tokio::main]
//! # async fn main() -> core_auth::Result<()> {
//! let manager = TokenManager::new(ProviderKind::OneDrive, Arc::new(BrowserFlow));
//! let token = manager.access_token().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{OAuthTokens, ProviderKind};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument, warn};

/// Default timeout for a token acquisition (2 minutes)
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(120);

/// Buffer time before token expiration to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(300);

/// Supplies bearer tokens to a provider connector.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A token valid for the next request.
    async fn access_token(&self) -> Result<String>;

    /// Discard the current token and obtain a new one.
    ///
    /// Failure means the session cannot be recovered without the user.
    async fn reauthenticate(&self) -> Result<()>;
}

/// Host-provided token acquisition (interactive sign-in or silent refresh).
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtain tokens for `provider`. `refresh_token` is the one from the
    /// previous token set, if any, for sources that can refresh silently.
    async fn acquire(
        &self,
        provider: ProviderKind,
        refresh_token: Option<String>,
    ) -> Result<OAuthTokens>;
}

/// Caching [`CredentialProvider`] backed by a [`TokenSource`].
///
/// The cache lock is held across acquisition, so concurrent callers never
/// trigger more than one refresh.
pub struct TokenManager {
    provider: ProviderKind,
    source: Arc<dyn TokenSource>,
    cached: Mutex<Option<OAuthTokens>>,
    refresh_buffer: Duration,
    acquire_timeout: Duration,
}

impl TokenManager {
    pub fn new(provider: ProviderKind, source: Arc<dyn TokenSource>) -> Self {
        Self {
            provider,
            source,
            cached: Mutex::new(None),
            refresh_buffer: TOKEN_REFRESH_BUFFER,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Seed the cache with tokens obtained elsewhere.
    pub fn with_tokens(self, tokens: OAuthTokens) -> Self {
        Self {
            cached: Mutex::new(Some(tokens)),
            ..self
        }
    }

    pub fn with_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.refresh_buffer = buffer;
        self
    }

    pub fn with_acquire_timeout(mut self, limit: Duration) -> Self {
        self.acquire_timeout = limit;
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn acquire(&self, refresh_token: Option<String>) -> Result<OAuthTokens> {
        match timeout(
            self.acquire_timeout,
            self.source.acquire(self.provider, refresh_token),
        )
        .await
        {
            Ok(result) => result.map_err(|e| {
                warn!(provider = self.provider.as_str(), error = %e, "Token acquisition failed");
                e
            }),
            Err(_) => {
                warn!(provider = self.provider.as_str(), "Token acquisition timed out");
                Err(AuthError::OperationTimeout {
                    operation: format!("{} token acquisition", self.provider.as_str()),
                })
            }
        }
    }
}

#[async_trait]
impl CredentialProvider for TokenManager {
    #[instrument(skip(self), fields(provider = self.provider.as_str()))]
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(tokens) = cached.as_ref() {
            if !tokens.is_expired_with_buffer(self.refresh_buffer.as_secs() as i64) {
                debug!("Token is valid, no refresh needed");
                return Ok(tokens.access_token.clone());
            }
        }

        info!("Token missing or expiring soon, acquiring");
        let refresh_token = cached.as_ref().and_then(|t| t.refresh_token.clone());
        let tokens = self.acquire(refresh_token).await?;
        let access_token = tokens.access_token.clone();
        *cached = Some(tokens);

        Ok(access_token)
    }

    #[instrument(skip(self), fields(provider = self.provider.as_str()))]
    async fn reauthenticate(&self) -> Result<()> {
        let mut cached = self.cached.lock().await;
        let refresh_token = cached.take().and_then(|t| t.refresh_token);

        let tokens = self.acquire(refresh_token).await?;
        *cached = Some(tokens);

        info!("Re-authenticated");
        Ok(())
    }
}

/// Fixed bearer token, for scripted runs and tests.
///
/// Re-authentication always fails.
#[derive(Clone)]
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredential")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    async fn reauthenticate(&self) -> Result<()> {
        Err(AuthError::NotAuthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use mockall::predicate::*;

    mock! {
        Source {}

        #[async_trait]
        impl TokenSource for Source {
            async fn acquire(
                &self,
                provider: ProviderKind,
                refresh_token: Option<String>,
            ) -> Result<OAuthTokens>;
        }
    }

    #[tokio::test]
    async fn test_access_token_acquires_once_and_caches() {
        let mut source = MockSource::new();
        source
            .expect_acquire()
            .with(eq(ProviderKind::GoogleDrive), eq(None::<String>))
            .times(1)
            .returning(|_, _| Ok(OAuthTokens::new("fresh".to_string(), None, 3600)));

        let manager = TokenManager::new(ProviderKind::GoogleDrive, Arc::new(source));

        assert_eq!(manager.access_token().await.unwrap(), "fresh");
        assert_eq!(manager.access_token().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_with_refresh_token() {
        let mut source = MockSource::new();
        source
            .expect_acquire()
            .with(eq(ProviderKind::OneDrive), eq(Some("r1".to_string())))
            .times(1)
            .returning(|_, _| {
                Ok(OAuthTokens::new(
                    "second".to_string(),
                    Some("r2".to_string()),
                    3600,
                ))
            });

        let stale = OAuthTokens::new("first".to_string(), Some("r1".to_string()), 60);
        let manager =
            TokenManager::new(ProviderKind::OneDrive, Arc::new(source)).with_tokens(stale);

        assert_eq!(manager.access_token().await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_reauthenticate_replaces_valid_token() {
        let mut source = MockSource::new();
        source
            .expect_acquire()
            .times(1)
            .returning(|_, _| Ok(OAuthTokens::new("rotated".to_string(), None, 3600)));

        let current = OAuthTokens::new("revoked".to_string(), None, 3600);
        let manager =
            TokenManager::new(ProviderKind::OneDrive, Arc::new(source)).with_tokens(current);

        manager.reauthenticate().await.unwrap();
        assert_eq!(manager.access_token().await.unwrap(), "rotated");
    }

    #[tokio::test]
    async fn test_acquire_failure_propagates() {
        let mut source = MockSource::new();
        source.expect_acquire().returning(|provider, _| {
            Err(AuthError::AuthenticationFailed {
                provider: provider.to_string(),
                reason: "user closed the browser".to_string(),
            })
        });

        let manager = TokenManager::new(ProviderKind::GoogleDrive, Arc::new(source));
        let err = manager.access_token().await.unwrap_err();

        assert!(matches!(err, AuthError::AuthenticationFailed { .. }));
    }

    struct SlowSource;

    #[async_trait]
    impl TokenSource for SlowSource {
        async fn acquire(&self, _: ProviderKind, _: Option<String>) -> Result<OAuthTokens> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(OAuthTokens::new("late".to_string(), None, 3600))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let manager = TokenManager::new(ProviderKind::GoogleDrive, Arc::new(SlowSource))
            .with_acquire_timeout(Duration::from_secs(5));

        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::OperationTimeout { .. }));
    }

    #[tokio::test]
    async fn test_static_credential() {
        let credential = StaticCredential::new("abc");

        assert_eq!(credential.access_token().await.unwrap(), "abc");
        assert!(credential.reauthenticate().await.is_err());
        assert!(!format!("{:?}", credential).contains("abc"));
    }
}
