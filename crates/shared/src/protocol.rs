use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// Endpoint path segments, relative to the backend base URL.
pub const CREATE_TASK_ENDPOINT: &str = "create_task";
pub const UPLOAD_CHAR_ENDPOINT: &str = "upload_char";
pub const CREATE_FONT_ENDPOINT: &str = "create_font";
pub const DOWNLOAD_ENDPOINT: &str = "download";

/// Multipart field names of a character upload.
pub const UPLOAD_FIELD_CHAR: &str = "char";
pub const UPLOAD_FIELD_FILE: &str = "file";
pub const UPLOAD_FIELD_TASK_ID: &str = "task_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Upload acknowledgement; an empty object is a valid ack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadAck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFontRequest {
    pub task_id: TaskId,
    pub font_name: String,
    pub characters: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateFontResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_name: Option<String>,
}

/// File name the download endpoint expects for a server-side artifact path.
pub fn artifact_file_name(font_path: &str) -> Option<&str> {
    font_path
        .rsplit(|ch: char| ch == '/' || ch == '\\')
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_file_name_takes_last_path_segment() {
        assert_eq!(
            artifact_file_name("output_fonts/My Font.ttf"),
            Some("My Font.ttf")
        );
        assert_eq!(artifact_file_name("plain.ttf"), Some("plain.ttf"));
        assert_eq!(artifact_file_name("out\\win.ttf"), Some("win.ttf"));
        assert_eq!(artifact_file_name("output_fonts/"), None);
    }

    #[test]
    fn create_font_response_tolerates_extra_and_missing_fields() {
        let parsed: CreateFontResponse = serde_json::from_str(
            r#"{"success":true,"font_path":"output_fonts/a.ttf","font_name":"a","message":"done"}"#,
        )
        .expect("response");
        assert_eq!(parsed.font_path.as_deref(), Some("output_fonts/a.ttf"));

        let empty: CreateFontResponse = serde_json::from_str("{}").expect("empty");
        assert!(empty.font_path.is_none());
    }
}
