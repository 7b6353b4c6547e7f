use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// The two ends of a migration.
///
/// ```
/// use core_auth::ProviderKind;
///
/// assert_eq!(ProviderKind::GoogleDrive.to_string(), "Google Drive");
/// assert!(ProviderKind::OneDrive.scopes().contains(&"offline_access"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Source; read-only access is enough
    GoogleDrive,
    /// Destination
    OneDrive,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GoogleDrive => "google_drive",
            ProviderKind::OneDrive => "onedrive",
        }
    }

    /// OAuth scopes a [`TokenSource`](crate::TokenSource) must request for
    /// this end of the migration.
    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            ProviderKind::GoogleDrive => &[
                "https://www.googleapis.com/auth/drive.readonly",
                "https://www.googleapis.com/auth/forms.body.readonly",
            ],
            ProviderKind::OneDrive => &["Files.ReadWrite.All", "offline_access"],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::GoogleDrive => "Google Drive",
            ProviderKind::OneDrive => "OneDrive",
        })
    }
}

/// Token set cached by [`TokenManager`](crate::TokenManager).
///
/// `Debug` never prints the token values.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Body of a successful token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

impl OAuthTokens {
    /// Token set expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    /// Parse a token endpoint response body. Both Google and the Microsoft
    /// identity platform answer with `access_token`, `expires_in` and an
    /// optional `refresh_token`.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidToken`] if the body is not a token response.
    pub fn from_token_response(body: &[u8]) -> Result<Self> {
        let response: TokenResponse = serde_json::from_slice(body)
            .map_err(|e| AuthError::InvalidToken(format!("Malformed token response: {}", e)))?;
        Ok(Self::new(
            response.access_token,
            response.refresh_token,
            response.expires_in,
        ))
    }

    /// Whether the token expires within `buffer_seconds`.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        Utc::now() >= self.expires_at - Duration::seconds(buffer_seconds)
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
