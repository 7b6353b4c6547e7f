//! Google Drive API connector implementation
//!
//! Implements `RemoteTreeSource` for Google Drive API v3 and the Forms API.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    EntryKind, EntryPage, FormDocument, FormItem, FormQuestion, RemoteEntry, RemoteTreeSource,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::CredentialProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::GoogleDriveError;
use crate::types::{DriveFile, FilesListResponse, Form, SizeResponse};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Forms API base URL
const FORMS_API_BASE: &str = "https://forms.googleapis.com/v1";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const LIST_FIELDS: &str =
    "nextPageToken, files(id, name, mimeType, parents, size, modifiedTime, trashed)";

/// Listing query: everything the user can see that is not in the trash
const LIST_QUERY: &str = "trashed = false";

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Default timeout for metadata and export requests
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Drive API connector
///
/// # Features
///
/// - Paginated listing of non-trashed files and folders
/// - Size pre-flight for exports
/// - Streaming downloads of binary content
/// - Export of native documents to office formats
/// - Form structure retrieval through the Forms API
///
/// Every request carries a bearer token from the [`CredentialProvider`]. A 401
/// triggers one re-authentication and one replay of the request.
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::RemoteTreeSource;
///
/// let connector = GoogleDriveConnector::new(http_client, credentials);
/// let page = connector.list_page(None).await?;
/// ```
pub struct GoogleDriveConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Bearer token supplier with `drive.readonly` and `forms.body.readonly` scopes
    credentials: Arc<dyn CredentialProvider>,

    request_timeout: Duration,
}

impl GoogleDriveConnector {
    /// Create a new Google Drive connector
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http_client,
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the timeout applied to non-streaming requests
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Parse RFC 3339 timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Convert DriveFile to RemoteEntry
    fn convert_file(drive_file: DriveFile) -> RemoteEntry {
        let kind = if drive_file.mime_type == FOLDER_MIME_TYPE {
            EntryKind::Folder
        } else {
            EntryKind::File
        };

        RemoteEntry {
            id: drive_file.id,
            name: drive_file.name,
            kind,
            parent_ids: drive_file.parents,
            size: drive_file
                .size
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            content_type: drive_file.mime_type,
            modified_at: drive_file
                .modified_time
                .as_deref()
                .and_then(Self::parse_timestamp),
        }
    }

    fn convert_form(form: Form) -> FormDocument {
        let items = form
            .items
            .into_iter()
            .map(|item| {
                let question = match item.question_item.map(|q| q.question) {
                    Some(question) => {
                        if let Some(choice) = question.choice_question {
                            FormQuestion::Choice {
                                options: choice
                                    .options
                                    .into_iter()
                                    .map(|option| {
                                        option.value.unwrap_or_else(|| "Option".to_string())
                                    })
                                    .collect(),
                            }
                        } else if let Some(text) = question.text_question {
                            FormQuestion::Text {
                                paragraph: text.paragraph,
                            }
                        } else {
                            FormQuestion::Other
                        }
                    }
                    None => FormQuestion::Other,
                };
                FormItem {
                    title: item.title,
                    question,
                }
            })
            .collect();

        FormDocument {
            title: form.info.title,
            description: form.info.description,
            items,
        }
    }

    async fn authorized(&self, method: HttpMethod, url: &str) -> Result<HttpRequest> {
        let token = self.credentials.access_token().await?;
        Ok(HttpRequest::new(method, url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(self.request_timeout))
    }

    /// GET `url`, re-authenticating once on 401.
    ///
    /// Non-success responses are returned as classified errors.
    #[instrument(skip(self))]
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let request = self.authorized(HttpMethod::Get, url).await?;
        let mut response = self.http_client.execute(request).await?;

        if response.status == 401 {
            warn!("Google rejected the access token, re-authenticating");
            self.credentials.reauthenticate().await?;
            let request = self.authorized(HttpMethod::Get, url).await?;
            response = self.http_client.execute(request).await?;
        }

        if response.is_success() {
            debug!(status = response.status, "API request succeeded");
            Ok(response)
        } else {
            let error = GoogleDriveError::from_response(response.status, &response.body);
            warn!(status = response.status, kind = %error.kind(), "API request failed");
            Err(error.into())
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            BridgeError::from(GoogleDriveError::ParseError(format!(
                "Failed to parse {}: {}",
                what, e
            )))
        })
    }
}

#[async_trait]
impl RemoteTreeSource for GoogleDriveConnector {
    #[instrument(skip(self))]
    async fn list_page(&self, page_token: Option<String>) -> Result<EntryPage> {
        let mut url = format!(
            "{}/files?q={}&pageSize={}&fields={}",
            DRIVE_API_BASE,
            urlencoding::encode(LIST_QUERY),
            MAX_PAGE_SIZE,
            urlencoding::encode(LIST_FIELDS)
        );

        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let response = self.get(&url).await?;
        let list_response: FilesListResponse = Self::parse(&response, "files list response")?;

        let entries: Vec<RemoteEntry> = list_response
            .files
            .into_iter()
            .filter(|f| !f.trashed)
            .map(Self::convert_file)
            .collect();

        info!("Listed {} entries from Google Drive", entries.len());

        Ok(EntryPage {
            entries,
            next_page_token: list_response.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn remote_size(&self, id: &str) -> Result<Option<u64>> {
        let url = format!(
            "{}/files/{}?fields=size",
            DRIVE_API_BASE,
            urlencoding::encode(id)
        );

        let response = self.get(&url).await?;
        let size: SizeResponse = Self::parse(&response, "size response")?;

        Ok(size.size.and_then(|s| s.parse().ok()))
    }

    #[instrument(skip(self))]
    async fn download(&self, id: &str) -> Result<ByteStream> {
        let url = format!(
            "{}/files/{}?alt=media",
            DRIVE_API_BASE,
            urlencoding::encode(id)
        );

        let token = self.credentials.access_token().await?;
        let mut response = self
            .http_client
            .download_stream(HttpRequest::new(HttpMethod::Get, &url).bearer_token(token))
            .await?;

        if response.status == 401 {
            warn!("Google rejected the access token, re-authenticating");
            self.credentials.reauthenticate().await?;
            let token = self.credentials.access_token().await?;
            response = self
                .http_client
                .download_stream(HttpRequest::new(HttpMethod::Get, &url).bearer_token(token))
                .await?;
        }

        if response.is_success() {
            info!("Download stream opened");
            Ok(response.body)
        } else {
            let status = response.status;
            let body = response.into_bytes().await.unwrap_or_default();
            Err(GoogleDriveError::from_response(status, &body).into())
        }
    }

    #[instrument(skip(self))]
    async fn export(&self, id: &str, mime_type: &str) -> Result<Bytes> {
        let url = format!(
            "{}/files/{}/export?mimeType={}",
            DRIVE_API_BASE,
            urlencoding::encode(id),
            urlencoding::encode(mime_type)
        );

        let response = self.get(&url).await?;
        info!("Exported {} bytes", response.body.len());

        Ok(response.body)
    }

    #[instrument(skip(self))]
    async fn fetch_form(&self, id: &str) -> Result<FormDocument> {
        let url = format!("{}/forms/{}", FORMS_API_BASE, urlencoding::encode(id));

        let response = self.get(&url).await?;
        let form: Form = Self::parse(&response, "form")?;

        Ok(Self::convert_form(form))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::TransferErrorKind;
    use bridge_traits::http::StreamingResponse;
    use core_auth::StaticCredential;
    use mockall::mock;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
            async fn download_stream(&self, request: HttpRequest) -> Result<StreamingResponse>;
        }
    }

    mock! {
        Credentials {}

        #[async_trait]
        impl CredentialProvider for Credentials {
            async fn access_token(&self) -> core_auth::Result<String>;
            async fn reauthenticate(&self) -> core_auth::Result<()>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn connector(http: MockHttpClient) -> GoogleDriveConnector {
        GoogleDriveConnector::new(Arc::new(http), Arc::new(StaticCredential::new("test_token")))
    }

    #[test]
    fn test_convert_file() {
        let drive_file = DriveFile {
            id: "file123".to_string(),
            name: "photo.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size: Some("1024".to_string()),
            modified_time: Some("2023-01-02T00:00:00.000Z".to_string()),
            parents: vec!["folder1".to_string()],
            trashed: false,
        };

        let entry = GoogleDriveConnector::convert_file(drive_file);

        assert_eq!(entry.id, "file123");
        assert_eq!(entry.kind, EntryKind::File);
        assert_eq!(entry.size, 1024);
        assert_eq!(entry.first_parent(), Some("folder1"));
        assert!(entry.modified_at.is_some());
    }

    #[test]
    fn test_convert_folder() {
        let drive_folder = DriveFile {
            id: "folder123".to_string(),
            name: "Projects".to_string(),
            mime_type: FOLDER_MIME_TYPE.to_string(),
            size: None,
            modified_time: None,
            parents: vec![],
            trashed: false,
        };

        let entry = GoogleDriveConnector::convert_file(drive_folder);

        assert!(entry.is_folder());
        assert_eq!(entry.size, 0);
    }

    #[tokio::test]
    async fn test_list_page_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(
                req.headers.get("Authorization"),
                Some(&"Bearer test_token".to_string())
            );
            assert!(req.url.contains("q=trashed%20%3D%20false"));
            assert!(req.url.contains("pageSize=1000"));
            assert!(!req.url.contains("pageToken"));

            Ok(response(
                200,
                r#"{
                    "files": [
                        {"id": "f1", "name": "a.pdf", "mimeType": "application/pdf", "size": "10", "parents": ["d1"]},
                        {"id": "d1", "name": "Docs", "mimeType": "application/vnd.google-apps.folder"},
                        {"id": "t1", "name": "old.txt", "mimeType": "text/plain", "trashed": true}
                    ],
                    "nextPageToken": "next_page"
                }"#,
            ))
        });

        let page = connector(mock_http).list_page(None).await.unwrap();

        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].id, "f1");
        assert!(page.entries[1].is_folder());
        assert_eq!(page.next_page_token, Some("next_page".to_string()));
    }

    #[tokio::test]
    async fn test_list_page_passes_token() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.ends_with("&pageToken=abc%2F123"));
            Ok(response(200, r#"{"files": []}"#))
        });

        let page = connector(mock_http)
            .list_page(Some("abc/123".to_string()))
            .await
            .unwrap();

        assert!(page.entries.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_remote_size() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(2).returning(|req| {
            assert!(req.url.contains("fields=size"));
            if req.url.contains("doc1") {
                Ok(response(200, r#"{"size": "2048"}"#))
            } else {
                Ok(response(200, r#"{}"#))
            }
        });

        let connector = connector(mock_http);
        assert_eq!(connector.remote_size("doc1").await.unwrap(), Some(2048));
        assert_eq!(connector.remote_size("doc2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_download_success() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_download_stream().times(1).returning(|req| {
            assert!(req.headers.contains_key("Authorization"));
            assert!(req.url.contains("alt=media"));

            Ok(StreamingResponse {
                status: 200,
                headers: HashMap::new(),
                body: Box::new(std::io::Cursor::new(vec![1, 2, 3, 4, 5])),
            })
        });

        let mut stream = connector(mock_http).download("file1").await.unwrap();
        let mut data = Vec::new();
        stream.read_to_end(&mut data).await.unwrap();

        assert_eq!(data, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_download_stream().returning(|_| {
            Ok(StreamingResponse {
                status: 404,
                headers: HashMap::new(),
                body: Box::new(std::io::Cursor::new(
                    br#"{"error":{"code":404,"message":"File not found: x.","errors":[{"reason":"notFound"}]}}"#.to_vec(),
                )),
            })
        });

        let err = connector(mock_http).download("x").await.err().unwrap();
        assert_eq!(err.kind(), TransferErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_export_encodes_mime_type() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.contains("/files/doc1/export?mimeType=application%2Fvnd.openxmlformats"));
            Ok(response(200, "PK\u{3}\u{4}"))
        });

        let bytes = connector(mock_http)
            .export(
                "doc1",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            )
            .await
            .unwrap();

        assert_eq!(bytes.len(), 4);
    }

    #[tokio::test]
    async fn test_export_size_limit_is_classified() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|_| {
            Ok(response(
                403,
                r#"{"error":{"code":403,"message":"This file is too large to be exported.","errors":[{"reason":"exportSizeLimitExceeded"}]}}"#,
            ))
        });

        let err = connector(mock_http)
            .export("doc1", "application/pdf")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::ExportTooLarge);
    }

    #[tokio::test]
    async fn test_fetch_form() {
        let mut mock_http = MockHttpClient::new();

        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.url, "https://forms.googleapis.com/v1/forms/form1");
            Ok(response(
                200,
                r#"{
                    "info": {"title": "Feedback"},
                    "items": [
                        {"title": "Rating", "questionItem": {"question": {"choiceQuestion": {"options": [{"value": "Good"}, {"isOther": true}]}}}},
                        {"title": "Comments", "questionItem": {"question": {"textQuestion": {"paragraph": true}}}},
                        {"title": "Photo", "imageItem": {}}
                    ]
                }"#,
            ))
        });

        let form = connector(mock_http).fetch_form("form1").await.unwrap();

        assert_eq!(form.title.as_deref(), Some("Feedback"));
        assert_eq!(
            form.items[0].question,
            FormQuestion::Choice {
                options: vec!["Good".to_string(), "Option".to_string()]
            }
        );
        assert_eq!(form.items[1].question, FormQuestion::Text { paragraph: true });
        assert_eq!(form.items[2].question, FormQuestion::Other);
    }

    #[tokio::test]
    async fn test_unauthorized_reauthenticates_once() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();

        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(401, "")));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|req| {
                assert_eq!(
                    req.headers.get("Authorization"),
                    Some(&"Bearer token".to_string())
                );
                Ok(response(200, r#"{"files": []}"#))
            });

        let mut credentials = MockCredentials::new();
        credentials
            .expect_access_token()
            .returning(|| Ok("token".to_string()));
        credentials
            .expect_reauthenticate()
            .times(1)
            .returning(|| Ok(()));

        let connector = GoogleDriveConnector::new(Arc::new(mock_http), Arc::new(credentials));
        assert!(connector.list_page(None).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_reauthentication_is_auth_expired() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, "")));

        let connector = connector(mock_http);
        let err = connector.list_page(None).await.unwrap_err();

        assert_eq!(err.kind(), TransferErrorKind::AuthExpired);
    }
}
