use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Closed classification of every failure a transfer can hit.
///
/// Provider clients map their raw failures onto this set exactly once, at the
/// API boundary. Everything above the connectors (retry decisions, error log
/// messages, run abort) works off the kind, never off error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferErrorKind {
    /// Document export refused because the source is over the export ceiling
    ExportTooLarge,
    /// Caller lacks permission on the source or destination item
    PermissionDenied,
    /// Item vanished or never existed
    NotFound,
    /// Timeout, 5xx or TLS-layer failure; retryable
    NetworkTransient,
    /// DNS failure or unreachable host; aborts the run
    NetworkFatal,
    /// Bearer credential expired or was revoked
    AuthExpired,
    /// Provider throttling; retryable with backoff
    RateLimited,
    /// Provider-side temporary backend failure; retryable
    BackendTemporary,
    /// Anything else, surfaced verbatim
    Unknown,
}

impl TransferErrorKind {
    /// Kinds the retry controller retries locally before giving up on an entry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransferErrorKind::NetworkTransient
                | TransferErrorKind::RateLimited
                | TransferErrorKind::BackendTemporary
        )
    }

    /// Kinds that stop the whole run instead of failing a single entry.
    pub fn is_fatal_connectivity(&self) -> bool {
        matches!(self, TransferErrorKind::NetworkFatal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferErrorKind::ExportTooLarge => "export_too_large",
            TransferErrorKind::PermissionDenied => "permission_denied",
            TransferErrorKind::NotFound => "not_found",
            TransferErrorKind::NetworkTransient => "network_transient",
            TransferErrorKind::NetworkFatal => "network_fatal",
            TransferErrorKind::AuthExpired => "auth_expired",
            TransferErrorKind::RateLimited => "rate_limited",
            TransferErrorKind::BackendTemporary => "backend_temporary",
            TransferErrorKind::Unknown => "unknown",
        }
    }

    /// Human-readable message for the error log.
    ///
    /// `Unknown` has no canned text; callers log the raw message instead.
    pub fn describe(&self) -> Option<&'static str> {
        let text = match self {
            TransferErrorKind::ExportTooLarge => {
                "This file is too large to be exported from Google Docs. \
                 Consider downloading it manually from Google Drive."
            }
            TransferErrorKind::PermissionDenied => {
                "You do not have permission to export or write this file. \
                 Check that you own it or have sufficient access."
            }
            TransferErrorKind::NotFound => {
                "File not found. It may have been deleted or moved."
            }
            TransferErrorKind::NetworkTransient => {
                "A temporary network error interrupted the transfer. Try again later."
            }
            TransferErrorKind::NetworkFatal => {
                "A network error prevented downloading or uploading the file. \
                 Check your Internet connection."
            }
            TransferErrorKind::AuthExpired => {
                "Your authentication session has expired. Please sign in again."
            }
            TransferErrorKind::RateLimited => {
                "The API request limit was exceeded. Try again in a few minutes."
            }
            TransferErrorKind::BackendTemporary => {
                "Temporary provider backend error. Try again later."
            }
            TransferErrorKind::Unknown => return None,
        };
        Some(text)
    }
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-level failure categories reported by `HttpClient` implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    Timeout,
    Tls,
    /// DNS resolution failed, host unreachable or connection refused
    Unreachable,
    /// Connection dropped while the request or body was in flight
    Interrupted,
    Other,
}

impl TransportFailure {
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            TransportFailure::Timeout | TransportFailure::Tls | TransportFailure::Interrupted => {
                TransferErrorKind::NetworkTransient
            }
            TransportFailure::Unreachable => TransferErrorKind::NetworkFatal,
            TransportFailure::Other => TransferErrorKind::Unknown,
        }
    }
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Transport error ({failure:?}): {message}")]
    Transport {
        failure: TransportFailure,
        message: String,
    },

    #[error("Remote error [{kind}]: {message}")]
    Remote {
        kind: TransferErrorKind,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Build a classified provider error.
    pub fn remote(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        BridgeError::Remote {
            kind,
            message: message.into(),
        }
    }

    /// Project this error onto the transfer taxonomy.
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            BridgeError::Transport { failure, .. } => failure.kind(),
            BridgeError::Remote { kind, .. } => *kind,
            BridgeError::NotAvailable(_) | BridgeError::OperationFailed(_) | BridgeError::Io(_) => {
                TransferErrorKind::Unknown
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
