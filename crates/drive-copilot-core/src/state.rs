//! Wire and session data types
//!
//! Everything the server sends is an immutable snapshot: the client never edits
//! a `DriveFile` or an `IngestionStatus`, it only replaces whole values.
//! Field names follow the server's camelCase aliases; snake_case is accepted on
//! input as well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    #[serde(alias = "is_authenticated")]
    pub is_authenticated: bool,
}

/// OAuth entry point returned by `GET /auth/google`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(alias = "mime_type")]
    pub mime_type: String,
    pub path: String,
    #[serde(alias = "modified_time")]
    pub modified_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, alias = "web_view_link", skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    /// Ids of the folders containing this file. Empty when the server omits it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFolder {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(alias = "file_count")]
    pub file_count: u32,
}

/// Server-side progress of the ingestion job.
///
/// An `error` ends the in-progress state, so a well-formed status never has
/// both `error` and `is_ingesting` set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionStatus {
    #[serde(alias = "is_ingesting")]
    pub is_ingesting: bool,
    #[serde(alias = "total_files")]
    pub total_files: u32,
    #[serde(alias = "processed_files")]
    pub processed_files: u32,
    #[serde(default, alias = "current_file")]
    pub current_file: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl IngestionStatus {
    /// Percentage of files processed, or `None` while the total is unknown.
    pub fn progress_percent(&self) -> Option<f64> {
        if self.total_files == 0 {
            return None;
        }
        Some(f64::from(self.processed_files) / f64::from(self.total_files) * 100.0)
    }

    /// Finished without error. A job that has not enumerated any files yet is
    /// never complete.
    pub fn is_complete(&self) -> bool {
        !self.is_ingesting && self.total_files > 0 && self.error.is_none()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartIngestionResponse {
    pub message: String,
}

/// A retrieved passage shown as evidence for an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub file: DriveFile,
    pub snippet: String,
    #[serde(alias = "relevance_score")]
    pub relevance_score: f32,
    #[serde(default)]
    pub highlights: Vec<String>,
}

pub type Source = SearchResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SearchResult>>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: &str) -> Self {
        Self::new(ChatRole::User, content.to_string(), None)
    }

    pub fn assistant(content: String, sources: Vec<SearchResult>) -> Self {
        Self::new(ChatRole::Assistant, content, Some(sources))
    }

    /// Assistant turn with no sources, used when the request failed
    pub fn assistant_notice(content: &str) -> Self {
        Self::new(ChatRole::Assistant, content.to_string(), None)
    }

    fn new(role: ChatRole, content: String, sources: Option<Vec<SearchResult>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            sources,
            timestamp: Utc::now(),
        }
    }

    pub fn sources(&self) -> &[SearchResult] {
        self.sources.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub conversation_history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub sources: Vec<SearchResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        let status = IngestionStatus {
            is_ingesting: true,
            total_files: 4,
            processed_files: 1,
            ..Default::default()
        };
        assert_eq!(status.progress_percent(), Some(25.0));
    }

    #[test]
    fn test_progress_indeterminate_without_total() {
        let status = IngestionStatus {
            is_ingesting: true,
            ..Default::default()
        };
        assert_eq!(status.progress_percent(), None);
    }

    #[test]
    fn test_complete_requires_files() {
        let empty = IngestionStatus::default();
        assert!(!empty.is_complete());

        let done = IngestionStatus {
            total_files: 10,
            processed_files: 10,
            ..Default::default()
        };
        assert!(done.is_complete());

        let failed = IngestionStatus {
            total_files: 10,
            error: Some("quota exceeded".to_string()),
            ..Default::default()
        };
        assert!(!failed.is_complete());
        assert!(failed.is_failed());
    }

    #[test]
    fn test_ingestion_status_accepts_both_casings() {
        let camel: IngestionStatus = serde_json::from_str(
            r#"{"isIngesting":true,"totalFiles":3,"processedFiles":1,"currentFile":"a.pdf"}"#,
        )
        .unwrap();
        let snake: IngestionStatus = serde_json::from_str(
            r#"{"is_ingesting":true,"total_files":3,"processed_files":1,"current_file":"a.pdf","error":null}"#,
        )
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(camel.current_file.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn test_drive_file_optional_fields() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id":"f1","name":"Plan.docx","mimeType":"application/pdf","path":"/Work/Plan.docx","modifiedTime":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(file.size, None);
        assert!(file.parents.is_empty());
    }

    #[test]
    fn test_chat_message_wire_shape() {
        let message = ChatMessage::user("hello");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "hello");
        assert!(value.get("sources").is_none());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_chat_request_omits_empty_scope() {
        let request = ChatRequest {
            message: "hi".to_string(),
            conversation_history: Vec::new(),
            folder_id: None,
            file_id: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("folderId").is_none());
        assert!(value.get("fileId").is_none());
        assert_eq!(value["conversationHistory"], serde_json::json!([]));
    }
}
