//! Microsoft Graph connector implementation
//!
//! Implements `UploadDestination` against `/me/drive` using path addressing.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{ChunkStatus, UploadDestination};
use bytes::Bytes;
use core_auth::CredentialProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::OneDriveError;
use crate::types::{
    CreateFolderRequest, CreateSessionRequest, EmptyFacet, SessionItem, UploadSessionResponse,
    CONFLICT_RENAME, CONFLICT_REPLACE,
};

/// Drive root of the signed-in user
const DRIVE_ROOT: &str = "https://graph.microsoft.com/v1.0/me/drive/root";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// OneDrive connector
///
/// Lookups and folder creation re-authenticate and replay once on 401.
/// Upload calls report 401 as `AuthExpired` and leave recovery to the caller,
/// which must open a new session after re-authenticating.
pub struct OneDriveConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialProvider>,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl OneDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http_client,
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, request: Duration, upload: Duration) -> Self {
        self.request_timeout = request;
        self.upload_timeout = upload;
        self
    }

    /// Percent-encode each segment of a `/`-separated path, dropping empty ones.
    pub fn encode_path(path: &str) -> String {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn item_url(path: &str) -> String {
        format!("{}:/{}", DRIVE_ROOT, Self::encode_path(path))
    }

    async fn authorize(&self, request: HttpRequest) -> Result<HttpRequest> {
        let token = self.credentials.access_token().await?;
        Ok(request.bearer_token(token))
    }

    /// Execute with a bearer token, replaying once after re-authentication on 401.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self
            .http_client
            .execute(self.authorize(request.clone()).await?)
            .await?;

        if response.status != 401 {
            return Ok(response);
        }

        warn!("Graph rejected the access token, re-authenticating");
        self.credentials.reauthenticate().await?;
        self.http_client.execute(self.authorize(request).await?).await
    }

    fn fail(response: &HttpResponse) -> BridgeError {
        let error = OneDriveError::from_response(response.status, &response.body);
        warn!(status = response.status, kind = %error.kind(), "Graph request failed");
        error.into()
    }
}

#[async_trait]
impl UploadDestination for OneDriveConnector {
    #[instrument(skip(self))]
    async fn item_exists(&self, path: &str) -> Result<bool> {
        let request =
            HttpRequest::new(HttpMethod::Get, Self::item_url(path)).timeout(self.request_timeout);
        let response = self.send(request).await?;

        match response.status {
            404 => Ok(false),
            status if (200..300).contains(&status) => Ok(true),
            _ => Err(Self::fail(&response)),
        }
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, parent: Option<&str>, name: &str) -> Result<()> {
        let url = match parent.map(Self::encode_path).filter(|p| !p.is_empty()) {
            Some(parent) => format!("{}:/{}:/children", DRIVE_ROOT, parent),
            None => format!("{}/children", DRIVE_ROOT),
        };

        let body = CreateFolderRequest {
            name,
            folder: EmptyFacet::default(),
            conflict_behavior: CONFLICT_RENAME,
        };
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&body)?
            .timeout(self.request_timeout);
        let response = self.send(request).await?;

        match response.status {
            200 | 201 => {
                info!("Created folder");
                Ok(())
            }
            409 => {
                debug!("Folder already exists");
                Ok(())
            }
            _ => Err(Self::fail(&response)),
        }
    }

    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn upload_small(&self, path: &str, data: Bytes) -> Result<()> {
        let request = HttpRequest::new(
            HttpMethod::Put,
            format!("{}:/content", Self::item_url(path)),
        )
        .header("Content-Type", "application/octet-stream")
        .body(data)
        .timeout(self.upload_timeout);

        let response = self
            .http_client
            .execute(self.authorize(request).await?)
            .await?;

        match response.status {
            200 | 201 => Ok(()),
            _ => Err(Self::fail(&response)),
        }
    }

    #[instrument(skip(self))]
    async fn create_upload_session(&self, path: &str) -> Result<String> {
        let body = CreateSessionRequest {
            item: SessionItem {
                conflict_behavior: CONFLICT_REPLACE,
            },
        };
        let request = HttpRequest::new(
            HttpMethod::Post,
            format!("{}:/createUploadSession", Self::item_url(path)),
        )
        .json(&body)?
        .timeout(self.request_timeout);

        let response = self
            .http_client
            .execute(self.authorize(request).await?)
            .await?;

        if !response.is_success() {
            return Err(Self::fail(&response));
        }

        let session: UploadSessionResponse = serde_json::from_slice(&response.body).map_err(|e| {
            BridgeError::from(OneDriveError::ParseError(format!(
                "Failed to parse upload session: {}",
                e
            )))
        })?;

        debug!(expires = ?session.expiration_date_time, "Upload session created");
        Ok(session.upload_url)
    }

    /// Upload URLs are pre-authenticated; no bearer token is attached.
    #[instrument(skip(self, session_url, data))]
    async fn upload_chunk(
        &self,
        session_url: &str,
        start: u64,
        end: u64,
        total: u64,
        data: Bytes,
    ) -> Result<ChunkStatus> {
        let request = HttpRequest::new(HttpMethod::Put, session_url)
            .content_range(start, end, total)
            .body(data)
            .timeout(self.upload_timeout);

        let response = self.http_client.execute(request).await?;

        match response.status {
            200 | 201 => Ok(ChunkStatus::Completed),
            202 => Ok(ChunkStatus::Accepted),
            _ => Err(Self::fail(&response)),
        }
    }

    async fn reauthenticate(&self) -> Result<()> {
        self.credentials.reauthenticate().await?;
        Ok(())
    }
}
