//! # Migration Configuration Module
//!
//! Provides the tunables and injected bridges for a migration run.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `MigrationConfig`. Every tunable has a default matching the destination
//! API's limits, and `build()` validates the whole set before any network
//! traffic happens.
//!
//! ## Dependencies
//!
//! - `FileSystemAccess` - Required for the progress ledger and error log
//!   (desktop default: tokio fs)
//! - `HttpClient` - Optional; used when the host lets the core build the
//!   provider connectors (desktop default: reqwest)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::MigrationConfig;
//!
//! let config = MigrationConfig::builder()
//!     .destination_root("From Google Drive")
//!     .chunk_size(20 * 320 * 1024)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! Invalid tunables fail fast with an actionable message:
//!
//! ```ignore
//! use core_runtime::config::MigrationConfig;
//!
//! let err = MigrationConfig::builder()
//!     .chunk_size(1000)
//!     .build()
//!     .unwrap_err();
//! assert!(err.to_string().contains("multiple of 320 KiB"));
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;

/// Granularity the destination requires for upload-session chunks.
pub const CHUNK_ALIGNMENT: usize = 320 * 1024;

/// Chunks must stay strictly below this size.
pub const MAX_CHUNK_SIZE: usize = 60 * 1024 * 1024;

/// Largest payload the destination accepts in a single request.
pub const MAX_SIMPLE_UPLOAD: u64 = 250 * MIB;

pub const DEFAULT_CHUNK_SIZE: usize = 32 * CHUNK_ALIGNMENT;
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 4 * MIB;
pub const DEFAULT_MAX_EXPORT_SIZE: u64 = 100 * MIB;
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * GIB;
pub const DEFAULT_LEDGER_PATH: &str = "migration_progress.json";
pub const DEFAULT_ERROR_LOG_PATH: &str = "migration_errors.txt";

/// Configuration for a migration run.
///
/// Use [`MigrationConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct MigrationConfig {
    /// Upload-session chunk size in bytes
    pub chunk_size: usize,

    /// Payloads up to and including this size go through a single request
    pub large_file_threshold: u64,

    /// Documents larger than this are not exported
    pub max_export_size: u64,

    /// Files larger than this are skipped as unsupported
    pub max_file_size: u64,

    /// Total attempts per entry for retryable failures
    pub max_retries: u32,

    /// Linear backoff unit between entry attempts
    pub backoff_base: Duration,

    /// Total attempts for a single content fetch
    pub fetch_attempts: u32,

    /// Exponential backoff unit between fetch attempts
    pub fetch_backoff_base: Duration,

    /// Re-authentications allowed within one upload
    pub max_reauth_attempts: u32,

    /// Deepest folder nesting accepted during path reconstruction
    pub max_folder_depth: usize,

    /// Destination folder all migrated content lands under (empty = drive root)
    pub destination_root: String,

    /// Skip entries already recorded in the ledger
    pub skip_existing: bool,

    /// Progress ledger location
    pub ledger_path: PathBuf,

    /// Error log location
    pub error_log_path: PathBuf,

    /// Capacity of the progress event channel
    pub event_channel_capacity: usize,

    /// Timeout applied to metadata requests
    pub request_timeout: Duration,

    /// Timeout applied to content transfers
    pub upload_timeout: Duration,

    /// HTTP client for provider connectors (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// File system access for the ledger and error log
    pub file_system: Arc<dyn FileSystemAccess>,
}

impl std::fmt::Debug for MigrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("chunk_size", &self.chunk_size)
            .field("large_file_threshold", &self.large_file_threshold)
            .field("max_export_size", &self.max_export_size)
            .field("max_file_size", &self.max_file_size)
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .field("fetch_attempts", &self.fetch_attempts)
            .field("fetch_backoff_base", &self.fetch_backoff_base)
            .field("max_reauth_attempts", &self.max_reauth_attempts)
            .field("max_folder_depth", &self.max_folder_depth)
            .field("destination_root", &self.destination_root)
            .field("skip_existing", &self.skip_existing)
            .field("ledger_path", &self.ledger_path)
            .field("error_log_path", &self.error_log_path)
            .field("event_channel_capacity", &self.event_channel_capacity)
            .field("request_timeout", &self.request_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("file_system", &"FileSystemAccess { ... }")
            .finish()
    }
}

impl MigrationConfig {
    /// Creates a new builder for constructing a `MigrationConfig`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use core_runtime::config::MigrationConfig;
    ///
    /// let builder = MigrationConfig::builder();
    /// ```
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Chunk size is a non-zero multiple of 320 KiB below 60 MiB
    /// - The single-request threshold fits the destination's limit
    /// - Attempt counts, depth and channel capacity are usable
    /// - Ledger and error log paths are set and distinct
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size % CHUNK_ALIGNMENT != 0 {
            return Err(Error::Config(format!(
                "Chunk size must be a non-zero multiple of 320 KiB ({} bytes), got {}",
                CHUNK_ALIGNMENT, self.chunk_size
            )));
        }

        if self.chunk_size >= MAX_CHUNK_SIZE {
            return Err(Error::Config(
                "Chunk size must be below 60 MiB; the destination rejects larger ranges"
                    .to_string(),
            ));
        }

        if self.large_file_threshold == 0 {
            return Err(Error::Config(
                "Large file threshold must be greater than 0 bytes".to_string(),
            ));
        }

        if self.large_file_threshold > MAX_SIMPLE_UPLOAD {
            return Err(Error::Config(
                "Large file threshold exceeds maximum of 250 MiB for single-request uploads"
                    .to_string(),
            ));
        }

        if self.max_export_size == 0 || self.max_file_size == 0 {
            return Err(Error::Config(
                "Maximum export and file sizes must be greater than 0 bytes".to_string(),
            ));
        }

        if self.max_retries == 0 || self.max_retries > 20 {
            return Err(Error::Config(
                "Max retries must be between 1 and 20 attempts".to_string(),
            ));
        }

        if self.fetch_attempts == 0 || self.fetch_attempts > 20 {
            return Err(Error::Config(
                "Fetch attempts must be between 1 and 20".to_string(),
            ));
        }

        if self.max_reauth_attempts > 10 {
            return Err(Error::Config(
                "Max re-authentication attempts exceeds maximum of 10".to_string(),
            ));
        }

        if self.max_folder_depth == 0 {
            return Err(Error::Config(
                "Max folder depth must be greater than 0".to_string(),
            ));
        }

        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "Event channel capacity must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() || self.upload_timeout.is_zero() {
            return Err(Error::Config(
                "Request and upload timeouts must be greater than 0".to_string(),
            ));
        }

        if self.ledger_path.as_os_str().is_empty() {
            return Err(Error::Config("Ledger path cannot be empty".to_string()));
        }

        if self.error_log_path.as_os_str().is_empty() {
            return Err(Error::Config("Error log path cannot be empty".to_string()));
        }

        if self.ledger_path == self.error_log_path {
            return Err(Error::Config(
                "Ledger path and error log path must point to different files".to_string(),
            ));
        }

        if self.destination_root.contains('\\') {
            return Err(Error::Config(
                "Destination root must use '/' as separator".to_string(),
            ));
        }

        Ok(())
    }

    /// Destination root split into its non-empty segments.
    pub fn destination_segments(&self) -> Vec<String> {
        self.destination_root
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the progress ledger and error log. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioFileSystem. \
                 Other hosts: inject a FileSystemAccess adapter with .file_system()."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for constructing [`MigrationConfig`] instances.
///
/// Unset tunables take their documented defaults; call
/// [`build()`](MigrationConfigBuilder::build) to validate and finish.
#[derive(Default)]
pub struct MigrationConfigBuilder {
    chunk_size: Option<usize>,
    large_file_threshold: Option<u64>,
    max_export_size: Option<u64>,
    max_file_size: Option<u64>,
    max_retries: Option<u32>,
    backoff_base: Option<Duration>,
    fetch_attempts: Option<u32>,
    fetch_backoff_base: Option<Duration>,
    max_reauth_attempts: Option<u32>,
    max_folder_depth: Option<usize>,
    destination_root: Option<String>,
    skip_existing: Option<bool>,
    ledger_path: Option<PathBuf>,
    error_log_path: Option<PathBuf>,
    event_channel_capacity: Option<usize>,
    request_timeout: Option<Duration>,
    upload_timeout: Option<Duration>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
}

impl MigrationConfigBuilder {
    /// Sets the upload-session chunk size in bytes.
    ///
    /// Default: 10 MiB (32 × 320 KiB). Must be a multiple of 320 KiB and
    /// below 60 MiB.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::MigrationConfig;
    ///
    /// let builder = MigrationConfig::builder()
    ///     .chunk_size(5 * 1024 * 1024); // 16 × 320 KiB
    /// ```
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    /// Sets the single-request upload threshold. Default: 4 MiB.
    pub fn large_file_threshold(mut self, bytes: u64) -> Self {
        self.large_file_threshold = Some(bytes);
        self
    }

    /// Sets the export size ceiling for native documents. Default: 100 MiB.
    pub fn max_export_size(mut self, bytes: u64) -> Self {
        self.max_export_size = Some(bytes);
        self
    }

    /// Sets the per-file size ceiling. Default: 10 GiB.
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Sets the total attempts per entry. Default: 3.
    pub fn max_retries(mut self, attempts: u32) -> Self {
        self.max_retries = Some(attempts);
        self
    }

    /// Sets the linear backoff unit between entry attempts.
    ///
    /// Default: 2 seconds. Retry `n` waits `n × backoff_base`.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    pub fn fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = Some(attempts);
        self
    }

    pub fn fetch_backoff_base(mut self, base: Duration) -> Self {
        self.fetch_backoff_base = Some(base);
        self
    }

    pub fn max_reauth_attempts(mut self, attempts: u32) -> Self {
        self.max_reauth_attempts = Some(attempts);
        self
    }

    pub fn max_folder_depth(mut self, depth: usize) -> Self {
        self.max_folder_depth = Some(depth);
        self
    }

    /// Sets the destination folder, `/`-separated, relative to the drive root.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::MigrationConfig;
    ///
    /// let builder = MigrationConfig::builder()
    ///     .destination_root("Archive/Google Drive");
    /// ```
    pub fn destination_root(mut self, root: impl Into<String>) -> Self {
        self.destination_root = Some(root.into());
        self
    }

    /// Whether entries already in the ledger are skipped. Default: true.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = Some(skip);
        self
    }

    pub fn ledger_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    pub fn error_log_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.error_log_path = Some(path.into());
        self
    }

    /// Sets the progress channel capacity. Default: 256 events.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = Some(capacity);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not set, the desktop default (`ReqwestHttpClient`) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not set, the desktop default (`TokioFileSystem`) is used when the
    /// `desktop-shims` feature is enabled; otherwise `build()` fails.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any tunable fails validation
    /// - No `FileSystemAccess` is provided and no desktop default is available
    pub fn build(self) -> Result<MigrationConfig> {
        let request_timeout = self.request_timeout.unwrap_or(Duration::from_secs(30));

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client(request_timeout)?,
        };

        let config = MigrationConfig {
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            large_file_threshold: self
                .large_file_threshold
                .unwrap_or(DEFAULT_LARGE_FILE_THRESHOLD),
            max_export_size: self.max_export_size.unwrap_or(DEFAULT_MAX_EXPORT_SIZE),
            max_file_size: self.max_file_size.unwrap_or(DEFAULT_MAX_FILE_SIZE),
            max_retries: self.max_retries.unwrap_or(3),
            backoff_base: self.backoff_base.unwrap_or(Duration::from_secs(2)),
            fetch_attempts: self.fetch_attempts.unwrap_or(3),
            fetch_backoff_base: self.fetch_backoff_base.unwrap_or(Duration::from_secs(1)),
            max_reauth_attempts: self.max_reauth_attempts.unwrap_or(3),
            max_folder_depth: self.max_folder_depth.unwrap_or(256),
            destination_root: self.destination_root.unwrap_or_default(),
            skip_existing: self.skip_existing.unwrap_or(true),
            ledger_path: self
                .ledger_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_PATH)),
            error_log_path: self
                .error_log_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ERROR_LOG_PATH)),
            event_channel_capacity: self.event_channel_capacity.unwrap_or(256),
            request_timeout,
            upload_timeout: self.upload_timeout.unwrap_or(Duration::from_secs(300)),
            http_client,
            file_system,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::BridgeError;
    use bytes::Bytes;
    use std::path::Path;

    struct MockFileSystem;

    #[async_trait]
    impl FileSystemAccess for MockFileSystem {
        async fn exists(&self, _path: &Path) -> std::result::Result<bool, BridgeError> {
            Ok(false)
        }

        async fn read_file(&self, _path: &Path) -> std::result::Result<Bytes, BridgeError> {
            Ok(Bytes::new())
        }

        async fn write_file_atomic(
            &self,
            _path: &Path,
            _data: Bytes,
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn append_file(
            &self,
            _path: &Path,
            _data: Bytes,
        ) -> std::result::Result<(), BridgeError> {
            Ok(())
        }

        async fn delete_file(&self, _path: &Path) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    fn builder() -> MigrationConfigBuilder {
        MigrationConfig::builder().file_system(Arc::new(MockFileSystem))
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.large_file_threshold, 4 * 1024 * 1024);
        assert_eq!(config.max_export_size, 100 * 1024 * 1024);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024 * 1024);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base, Duration::from_secs(2));
        assert_eq!(config.fetch_attempts, 3);
        assert_eq!(config.fetch_backoff_base, Duration::from_secs(1));
        assert_eq!(config.max_reauth_attempts, 3);
        assert_eq!(config.max_folder_depth, 256);
        assert!(config.skip_existing);
        assert_eq!(config.ledger_path, PathBuf::from("migration_progress.json"));
        assert_eq!(config.error_log_path, PathBuf::from("migration_errors.txt"));
        assert_eq!(config.event_channel_capacity, 256);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.upload_timeout, Duration::from_secs(300));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_file_system() {
        let result = MigrationConfig::builder().build();

        assert!(result.is_err());
        match result.unwrap_err() {
            Error::CapabilityMissing { capability, .. } => {
                assert_eq!(capability, "FileSystemAccess");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = MigrationConfig::builder()
            .build()
            .expect("desktop defaults should succeed");
        assert!(config.http_client.is_some());
    }

    #[test]
    fn test_validate_rejects_unaligned_chunk_size() {
        let result = builder().chunk_size(1000).build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("multiple of 320 KiB"));
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let result = builder().chunk_size(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_chunk() {
        // 192 × 320 KiB = 60 MiB exactly
        let result = builder().chunk_size(192 * CHUNK_ALIGNMENT).build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("below 60 MiB"));

        let ok = builder().chunk_size(191 * CHUNK_ALIGNMENT).build();
        assert!(ok.is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let result = builder().large_file_threshold(0).build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be greater than 0"));
    }

    #[test]
    fn test_validate_rejects_excessive_threshold() {
        let result = builder().large_file_threshold(300 * MIB).build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let result = builder().max_retries(0).build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Max retries"));
    }

    #[test]
    fn test_validate_rejects_same_ledger_and_log() {
        let result = builder()
            .ledger_path("state.txt")
            .error_log_path("state.txt")
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("different files"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let result = builder().event_channel_capacity(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_backoff_is_allowed() {
        let config = builder()
            .backoff_base(Duration::ZERO)
            .fetch_backoff_base(Duration::ZERO)
            .build()
            .unwrap();

        assert!(config.backoff_base.is_zero());
    }

    #[test]
    fn test_destination_segments() {
        let config = builder()
            .destination_root("/Archive// Google Drive /")
            .build()
            .unwrap();

        assert_eq!(
            config.destination_segments(),
            vec!["Archive".to_string(), "Google Drive".to_string()]
        );

        let root = builder().build().unwrap();
        assert!(root.destination_segments().is_empty());
    }

    #[test]
    fn test_destination_root_rejects_backslash() {
        let result = builder().destination_root("a\\b").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_accepts_pathbuf() {
        let config = builder()
            .ledger_path(PathBuf::from("/state/progress.json"))
            .error_log_path(PathBuf::from("/state/errors.txt"))
            .build()
            .unwrap();

        assert_eq!(config.ledger_path, PathBuf::from("/state/progress.json"));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = builder().max_retries(5).build().unwrap();
        let cloned = config.clone();

        assert_eq!(cloned.max_retries, 5);
        assert!(format!("{:?}", cloned).contains("FileSystemAccess { ... }"));
    }
}
