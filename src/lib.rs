//! # Drive Migration
//!
//! Facade over the workspace crates. Hosts depend on `drive-migration` and
//! reach every layer through the re-exports below.
//!
//! ## Crates
//!
//! - [`bridge_traits`]: HTTP, file system and provider contracts, error taxonomy
//! - [`core_runtime`]: configuration, logging, progress events
//! - [`core_auth`]: bearer credentials and token caching
//! - [`core_migration`]: the transfer engine
//! - [`provider_google_drive`] / [`provider_onedrive`]: source and destination connectors
//!
//! ## Features
//!
//! - `desktop-shims` (default): desktop HTTP and file system bridges, plus
//!   [`desktop::google_drive_to_onedrive`] which wires them into a ready
//!   orchestrator.

pub use bridge_traits;
pub use core_auth;
pub use core_migration;
pub use core_runtime;
pub use provider_google_drive;
pub use provider_onedrive;

pub use core_migration::{CancellationToken, MigrationError, MigrationOrchestrator, MigrationRun};
pub use core_runtime::{progress_channel, MigrationConfig, MigrationEvent, ProgressReceiver};

#[cfg(feature = "desktop-shims")]
pub mod desktop {
    //! Desktop wiring: reqwest transport, Google Drive source, OneDrive
    //! destination.

    use bridge_desktop::ReqwestHttpClient;
    use bridge_traits::HttpClient;
    use core_auth::CredentialProvider;
    use core_migration::{MigrationOrchestrator, Result};
    use core_runtime::{progress_channel, MigrationConfig, ProgressReceiver};
    use provider_google_drive::GoogleDriveConnector;
    use provider_onedrive::OneDriveConnector;
    use std::sync::Arc;
    use tracing::info;

    /// Build an orchestrator moving Google Drive content into OneDrive.
    ///
    /// Uses `config.http_client` when set, otherwise a reqwest client with
    /// the configured request timeout. Returns the progress receiver the host
    /// should drain.
    pub fn google_drive_to_onedrive(
        config: MigrationConfig,
        drive_credentials: Arc<dyn CredentialProvider>,
        onedrive_credentials: Arc<dyn CredentialProvider>,
    ) -> Result<(MigrationOrchestrator, ProgressReceiver)> {
        let http: Arc<dyn HttpClient> = match &config.http_client {
            Some(client) => client.clone(),
            None => Arc::new(ReqwestHttpClient::with_timeout(config.request_timeout)?),
        };

        let source = GoogleDriveConnector::new(http.clone(), drive_credentials)
            .with_request_timeout(config.request_timeout);
        let destination = OneDriveConnector::new(http, onedrive_credentials)
            .with_timeouts(config.request_timeout, config.upload_timeout);

        let (events, receiver) = progress_channel(config.event_channel_capacity);
        info!(
            root = %config.destination_root,
            chunk_size = config.chunk_size,
            "Desktop migration wired"
        );

        let orchestrator =
            MigrationOrchestrator::new(config, Arc::new(source), Arc::new(destination), events);
        Ok((orchestrator, receiver))
    }

}
