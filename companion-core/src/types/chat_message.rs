//! Chat message record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single chat message owned by a user.
///
/// `user_id` is not checked against any stored [`User`](super::User); messages
/// for unknown users are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub user_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Remaining message fields (role, text, attachments...), stored as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    /// Creates a message with a generated UUID and the current time.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self::with_id(
            Uuid::new_v4().to_string(),
            user_id,
            Utc::now().timestamp_millis(),
        )
    }

    pub fn with_id(id: impl Into<String>, user_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            timestamp,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_message_has_id_and_timestamp() {
        let before = Utc::now().timestamp_millis();
        let message = ChatMessage::new("u1");
        let after = Utc::now().timestamp_millis();

        assert!(Uuid::parse_str(&message.id).is_ok());
        assert_eq!(message.user_id, "u1");
        assert!(message.timestamp >= before && message.timestamp <= after);
        assert!(message.extra.is_empty());
    }

    #[test]
    fn test_message_uses_camel_case_user_id() {
        let message = ChatMessage::with_id("m1", "u1", 42).with_field("text", "hi");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({ "id": "m1", "userId": "u1", "timestamp": 42, "text": "hi" })
        );
    }
}
