use bridge_traits::error::{BridgeError, TransferErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Not authenticated")]
    NotAuthenticated,
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// Any credential failure reaching a transfer is an expired session.
impl From<AuthError> for BridgeError {
    fn from(error: AuthError) -> Self {
        BridgeError::remote(TransferErrorKind::AuthExpired, error.to_string())
    }
}
