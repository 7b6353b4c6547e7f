//! Google Drive API response types
//!
//! Data structures for deserializing Google Drive API v3 and Forms API v1
//! responses.

use serde::{Deserialize, Serialize};

/// Google Drive API file resource
///
/// See: https://developers.google.com/drive/api/v3/reference/files#resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// File ID
    pub id: String,

    /// File name
    pub name: String,

    /// MIME type
    pub mime_type: String,

    /// File size in bytes (omitted for folders and native documents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Modification time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,

    /// Parent folder IDs
    #[serde(default)]
    pub parents: Vec<String>,

    /// Whether file is trashed
    #[serde(default)]
    pub trashed: bool,
}

/// Google Drive API files.list response
///
/// See: https://developers.google.com/drive/api/v3/reference/files/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    /// List of files
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Token for next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response of a `files.get` call restricted to `fields=size`
#[derive(Debug, Deserialize)]
pub struct SizeResponse {
    #[serde(default)]
    pub size: Option<String>,
}

/// Standard Google API error envelope
///
/// ```json
/// {"error": {"code": 403, "message": "...", "errors": [{"reason": "..."}]}}
/// ```
#[derive(Debug, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: Option<String>,
}

/// OAuth token endpoint error, e.g. `{"error": "invalid_grant"}`
#[derive(Debug, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Google Forms API form resource
///
/// See: https://developers.google.com/forms/api/reference/rest/v1/forms
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    #[serde(default)]
    pub info: FormInfo,
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub question_item: Option<QuestionItem>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionItem {
    pub question: Question,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub choice_question: Option<ChoiceQuestion>,
    #[serde(default)]
    pub text_question: Option<TextQuestion>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceQuestion {
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceOption {
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TextQuestion {
    #[serde(default)]
    pub paragraph: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_drive_file() {
        let json = r#"{
            "id": "abc123",
            "name": "Budget.xlsx",
            "mimeType": "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "size": "1024",
            "modifiedTime": "2023-01-02T00:00:00.000Z",
            "parents": ["folder1"]
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(file.size, Some("1024".to_string()));
        assert!(!file.trashed);
    }

    #[test]
    fn test_deserialize_native_document_without_size() {
        let json = r#"{
            "id": "doc1",
            "name": "Notes",
            "mimeType": "application/vnd.google-apps.document"
        }"#;

        let file: DriveFile = serde_json::from_str(json).unwrap();
        assert!(file.size.is_none());
        assert!(file.parents.is_empty());
    }

    #[test]
    fn test_deserialize_files_list_response() {
        let json = r#"{
            "files": [
                {
                    "id": "file1",
                    "name": "photo.jpg",
                    "mimeType": "image/jpeg",
                    "parents": []
                }
            ],
            "nextPageToken": "token123"
        }"#;

        let response: FilesListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.files.len(), 1);
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }

    #[test]
    fn test_deserialize_error_envelope() {
        let json = r#"{
            "error": {
                "code": 403,
                "message": "This file is too large to be exported.",
                "errors": [{"domain": "global", "reason": "exportSizeLimitExceeded"}]
            }
        }"#;

        let envelope: ApiErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.error.code, 403);
        assert_eq!(
            envelope.error.errors[0].reason.as_deref(),
            Some("exportSizeLimitExceeded")
        );
    }

    #[test]
    fn test_deserialize_form() {
        let json = r#"{
            "formId": "f1",
            "info": {"title": "Survey", "description": "Tell us"},
            "items": [
                {
                    "title": "Colour?",
                    "questionItem": {"question": {"choiceQuestion": {
                        "type": "RADIO",
                        "options": [{"value": "Red"}, {"value": "Blue"}]
                    }}}
                },
                {
                    "questionItem": {"question": {"textQuestion": {"paragraph": true}}}
                },
                {"title": "Section", "pageBreakItem": {}}
            ]
        }"#;

        let form: Form = serde_json::from_str(json).unwrap();
        assert_eq!(form.info.title.as_deref(), Some("Survey"));
        assert_eq!(form.items.len(), 3);
        assert!(form.items[2].question_item.is_none());
    }
}
