//! Kafka message schemas
//!
//! Inbound upload events (one topic per image class) and the outbound
//! notification event.

use crate::models::lowercase_keys;
use serde::{Deserialize, Serialize};

/// Upload request received on the avatar or post topic
///
/// Field names are matched case-insensitively and unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadEvent {
    /// Base64-encoded image bytes
    #[serde(rename = "file")]
    pub file_base64: String,
    #[serde(rename = "fileextension")]
    pub file_extension: String,
    /// Target base name; stored as `{file_name}.png`
    #[serde(rename = "filename")]
    pub file_name: String,
    #[serde(rename = "iduser")]
    pub user_id: i64,
}

impl UploadEvent {
    /// Parse a raw Kafka payload
    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        serde_json::from_value(lowercase_keys(value))
    }
}

/// Severity carried by a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    Info,
    Warning,
    Error,
}

/// Notification emitted after an upload event was processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "idUser")]
    pub user_id: i64,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
}

impl NotificationEvent {
    pub fn info(user_id: i64, message: impl Into<String>) -> Self {
        Self {
            user_id,
            message: message.into(),
            kind: NotificationType::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_camel_case_event() {
        let payload = json!({
            "file": "aGVsbG8=",
            "fileExtension": ".jpg",
            "fileName": "u42",
            "idUser": 42
        });
        let event = UploadEvent::from_payload(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.file_base64, "aGVsbG8=");
        assert_eq!(event.file_extension, ".jpg");
        assert_eq!(event.file_name, "u42");
        assert_eq!(event.user_id, 42);
    }

    #[test]
    fn test_parse_ignores_case_and_unknown_fields() {
        let payload = json!({
            "FILE": "aGVsbG8=",
            "FileExtension": ".PNG",
            "FILENAME": "post-7",
            "IDUSER": 7,
            "traceId": "abc"
        });
        let event = UploadEvent::from_payload(payload.to_string().as_bytes()).unwrap();
        assert_eq!(event.file_extension, ".PNG");
        assert_eq!(event.user_id, 7);
    }

    #[test]
    fn test_parse_rejects_unusable_payloads() {
        assert!(UploadEvent::from_payload(b"not json").is_err());
        assert!(UploadEvent::from_payload(b"null").is_err());
        assert!(UploadEvent::from_payload(br#"{"file":"aGVsbG8="}"#).is_err());
    }

    #[test]
    fn test_notification_wire_format() {
        let event = NotificationEvent::info(42, "Avatar updated successfully");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"idUser": 42, "message": "Avatar updated successfully", "type": "Info"})
        );
    }
}
