//! # Desktop Bridges
//!
//! Bridge implementations for a desktop host:
//!
//! - [`ReqwestHttpClient`]: rustls-backed `HttpClient`, transport failures
//!   classified for the migration error taxonomy, streaming downloads
//! - [`TokioFileSystem`]: `FileSystemAccess` for the ledger and error log,
//!   with staged atomic replace
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let http = Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(60))?);
//! let state = Arc::new(TokioFileSystem::with_base_dir(state_dir));
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
