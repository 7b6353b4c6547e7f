//! Error types for Google Drive provider

use bridge_traits::error::{BridgeError, TransferErrorKind};
use thiserror::Error;

use crate::types::{ApiErrorEnvelope, OAuthErrorBody};

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError {
        status_code: u16,
        /// First `errors[].reason` of the error envelope, if any
        reason: Option<String>,
        message: String,
    },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Build an API error from a non-success response body.
    pub fn from_response(status_code: u16, body: &[u8]) -> Self {
        if let Ok(envelope) = serde_json::from_slice::<ApiErrorEnvelope>(body) {
            let reason = envelope
                .error
                .errors
                .iter()
                .find_map(|detail| detail.reason.clone())
                .or(envelope.error.status);
            return GoogleDriveError::ApiError {
                status_code,
                reason,
                message: envelope.error.message,
            };
        }

        if let Ok(oauth) = serde_json::from_slice::<OAuthErrorBody>(body) {
            return GoogleDriveError::ApiError {
                status_code,
                message: oauth.error_description.unwrap_or_else(|| oauth.error.clone()),
                reason: Some(oauth.error),
            };
        }

        GoogleDriveError::ApiError {
            status_code,
            reason: None,
            message: String::from_utf8_lossy(body).trim().to_string(),
        }
    }

    /// Classify onto the transfer taxonomy.
    ///
    /// Reasons win over status codes: Drive reports export-size and quota
    /// failures as 403.
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            GoogleDriveError::ApiError {
                status_code,
                reason,
                ..
            } => {
                match reason.as_deref() {
                    Some("exportSizeLimitExceeded") => return TransferErrorKind::ExportTooLarge,
                    Some("rateLimitExceeded") | Some("userRateLimitExceeded") => {
                        return TransferErrorKind::RateLimited
                    }
                    Some("backendError") => return TransferErrorKind::BackendTemporary,
                    Some("invalid_grant") | Some("authError") => {
                        return TransferErrorKind::AuthExpired
                    }
                    _ => {}
                }
                match status_code {
                    401 => TransferErrorKind::AuthExpired,
                    403 => TransferErrorKind::PermissionDenied,
                    404 => TransferErrorKind::NotFound,
                    429 => TransferErrorKind::RateLimited,
                    500..=599 => TransferErrorKind::NetworkTransient,
                    _ => TransferErrorKind::Unknown,
                }
            }
            GoogleDriveError::ParseError(_) => TransferErrorKind::Unknown,
            GoogleDriveError::BridgeError(e) => e.kind(),
        }
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::remote(other.kind(), other.to_string()),
        }
    }
}
