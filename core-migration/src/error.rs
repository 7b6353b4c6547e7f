use bridge_traits::error::{BridgeError, TransferErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Progress ledger error: {0}")]
    Ledger(String),

    #[error("Error log error: {0}")]
    ErrorLog(String),

    #[error("Folder {folder_id} is nested deeper than {depth} levels or part of a cycle")]
    PathCycle { folder_id: String, depth: usize },

    #[error("Unsupported entry {name}: {reason}")]
    Unsupported { name: String, reason: String },

    #[error("Transfer failed [{kind}]: {message}")]
    Transfer {
        kind: TransferErrorKind,
        message: String,
    },

    #[error("Document builder failed: {0}")]
    DocumentBuilder(String),

    #[error("Migration aborted: {message}")]
    Aborted { message: String },

    #[error("Migration cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

impl MigrationError {
    pub fn transfer(kind: TransferErrorKind, message: impl Into<String>) -> Self {
        MigrationError::Transfer {
            kind,
            message: message.into(),
        }
    }

    /// Project this error onto the transfer taxonomy.
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            MigrationError::Transfer { kind, .. } => *kind,
            MigrationError::Bridge(e) => e.kind(),
            MigrationError::Aborted { .. } => TransferErrorKind::NetworkFatal,
            _ => TransferErrorKind::Unknown,
        }
    }

    /// Message for the error log: the canned text for classified failures,
    /// the raw error otherwise.
    pub fn user_message(&self) -> String {
        match self.kind().describe() {
            Some(text) => text.to_string(),
            None => self.to_string(),
        }
    }
}
