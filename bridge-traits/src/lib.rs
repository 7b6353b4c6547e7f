//! # Host Bridge Traits
//!
//! Contracts between the migration engine and the outside world.
//!
//! ## Overview
//!
//! The engine never talks to a concrete HTTP stack, file system or cloud API.
//! Each capability it needs is a trait here, implemented by `bridge-desktop`
//! (HTTP, files) or by a provider crate (source and destination drives).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Single-attempt HTTP with classified transport failures
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Ledger and error-log persistence
//!
//! ### Providers
//! - [`RemoteTreeSource`](storage::RemoteTreeSource) - Listing, download, export, forms
//! - [`UploadDestination`](storage::UploadDestination) - Folders, simple and chunked uploads
//!
//! ### Logging
//! - [`LoggerSink`](log::LoggerSink) - Mirror engine logs into the host's log view
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! classify failures into [`TransferErrorKind`](error::TransferErrorKind) at
//! the point where the raw status or transport error is still visible:
//!
//! ```ignore
//! use bridge_traits::error::{BridgeError, TransferErrorKind};
//!
//! if response.status == 404 {
//!     return Err(BridgeError::remote(TransferErrorKind::NotFound, "item missing"));
//! }
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single orchestrator task can
//! hold them behind `Arc<dyn _>`.

pub mod error;
pub mod http;
pub mod log;
pub mod storage;

pub use error::{BridgeError, TransferErrorKind, TransportFailure};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse};
pub use storage::{
    ChunkStatus, EntryKind, EntryPage, FileSystemAccess, FormDocument, FormItem,
    FormQuestion, RemoteEntry, RemoteTreeSource, UploadDestination,
};
