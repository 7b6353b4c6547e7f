//! Error types for OneDrive provider

use bridge_traits::error::{BridgeError, TransferErrorKind};
use thiserror::Error;

use crate::types::GraphErrorEnvelope;

#[derive(Error, Debug)]
pub enum OneDriveError {
    #[error("Graph API error (status {status_code}): {message}")]
    ApiError {
        status_code: u16,
        /// Graph `error.code`, e.g. `itemNotFound`
        code: Option<String>,
        message: String,
    },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, OneDriveError>;

impl OneDriveError {
    pub fn from_response(status_code: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<GraphErrorEnvelope>(body) {
            Ok(envelope) => OneDriveError::ApiError {
                status_code,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => OneDriveError::ApiError {
                status_code,
                code: None,
                message: String::from_utf8_lossy(body).trim().to_string(),
            },
        }
    }

    pub fn kind(&self) -> TransferErrorKind {
        match self {
            OneDriveError::ApiError {
                status_code, code, ..
            } => {
                match code.as_deref() {
                    Some("Throttled") | Some("activityLimitReached") => {
                        return TransferErrorKind::RateLimited
                    }
                    Some("serviceNotAvailable") => return TransferErrorKind::BackendTemporary,
                    _ => {}
                }
                match status_code {
                    401 => TransferErrorKind::AuthExpired,
                    403 => TransferErrorKind::PermissionDenied,
                    404 => TransferErrorKind::NotFound,
                    429 => TransferErrorKind::RateLimited,
                    503 => TransferErrorKind::BackendTemporary,
                    500..=599 => TransferErrorKind::NetworkTransient,
                    _ => TransferErrorKind::Unknown,
                }
            }
            OneDriveError::ParseError(_) => TransferErrorKind::Unknown,
            OneDriveError::BridgeError(e) => e.kind(),
        }
    }
}

impl From<OneDriveError> for BridgeError {
    fn from(error: OneDriveError) -> Self {
        match error {
            OneDriveError::BridgeError(e) => e,
            other => BridgeError::remote(other.kind(), other.to_string()),
        }
    }
}
