//! Microsoft Graph request and response types

use serde::{Deserialize, Serialize};

/// Conflict policy for new folders: keep both by renaming the new one
pub const CONFLICT_RENAME: &str = "rename";

/// Conflict policy for uploads: overwrite the existing item
pub const CONFLICT_REPLACE: &str = "replace";

/// Body of `POST .../children` creating a folder
#[derive(Debug, Serialize)]
pub struct CreateFolderRequest<'a> {
    pub name: &'a str,
    pub folder: EmptyFacet,
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub struct EmptyFacet {}

/// Body of `POST .../createUploadSession`
#[derive(Debug, Serialize)]
pub struct CreateSessionRequest<'a> {
    pub item: SessionItem<'a>,
}

#[derive(Debug, Serialize)]
pub struct SessionItem<'a> {
    #[serde(rename = "@microsoft.graph.conflictBehavior")]
    pub conflict_behavior: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub upload_url: String,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
}

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
pub struct GraphErrorEnvelope {
    pub error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_folder_body() {
        let body = CreateFolderRequest {
            name: "Reports",
            folder: EmptyFacet::default(),
            conflict_behavior: CONFLICT_RENAME,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "Reports",
                "folder": {},
                "@microsoft.graph.conflictBehavior": "rename"
            })
        );
    }

    #[test]
    fn test_session_body() {
        let body = CreateSessionRequest {
            item: SessionItem {
                conflict_behavior: CONFLICT_REPLACE,
            },
        };

        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"item":{"@microsoft.graph.conflictBehavior":"replace"}}"#);
    }

    #[test]
    fn test_session_response() {
        let json = r#"{"uploadUrl": "https://up.example/s1", "expirationDateTime": "2024-01-01T00:00:00Z"}"#;
        let session: UploadSessionResponse = serde_json::from_str(json).unwrap();

        assert_eq!(session.upload_url, "https://up.example/s1");
    }
}
