//! Inbound frame envelope and per-event payload types.
//!
//! A [`ServerFrame`] is decoded in two steps: the envelope first, then the
//! payload once the event name is recognized. Payload structs mark genuinely
//! required fields as non-optional so that a malformed frame fails
//! deserialization as a whole and can be dropped without partial processing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{ChatMessage, ConversationRef, UserSummary};

/// One named event received from the realtime server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl ServerFrame {
    /// Decode the payload into a typed per-event struct.
    pub fn payload<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Post-authentication acknowledgement from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPayload {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_id: Option<String>,
}

/// A new message arriving in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessagePayload {
    pub message: ChatMessage,
    pub conversation: ConversationRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Acknowledgement that a sent message was accepted by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_correlation_id: Option<String>,
}

/// Server-side failure to deliver a previously sent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_correlation_id: Option<String>,
}

/// The counterpart has read messages in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    pub user_id: String,
    pub conversation_id: String,
    pub read_count: u32,
    pub read_at: DateTime<Utc>,
}

/// A message was deleted, possibly for both parties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    pub message_id: String,
    pub delete_for_everyone: bool,
    pub deleted_by: String,
    pub deleted_at: DateTime<Utc>,
}

/// A whole conversation was removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDeletedPayload {
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

/// The counterpart started or stopped typing; which one is carried by the
/// event name (`user_typing` / `user_stop_typing`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub conversation_id: String,
    pub user_id: String,
    pub user: UserSummary,
    pub timestamp: DateTime<Utc>,
}

/// A user came online or went offline; which one is carried by the event
/// name (`user_online` / `user_offline`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub user_id: String,
    pub user: UserSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

/// Generic server-reported error frame (`error` / `auth_error`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;

    #[test]
    fn envelope_tolerates_missing_data() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"event":"ping"}"#).expect("envelope should deserialize");
        assert_eq!(frame.event, "ping");
        assert!(frame.data.is_null());
    }

    #[test]
    fn new_message_payload_requires_conversation() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{"event":"new_message","data":{"message":{"id":"m1","text":"hi"}}}"#,
        )
        .unwrap();
        assert_eq!(frame.event, events::NEW_MESSAGE);
        assert!(frame.payload::<NewMessagePayload>().is_err());
    }

    #[test]
    fn new_message_payload_decodes_with_optional_fields_absent() {
        let frame: ServerFrame = serde_json::from_str(
            r#"{
                "event": "new_message",
                "data": {
                    "message": {"_id": "m1", "text": "hi"},
                    "conversation": {"_id": "c1", "productId": "p9"}
                }
            }"#,
        )
        .unwrap();
        let payload: NewMessagePayload = frame.payload().expect("payload should decode");
        assert_eq!(payload.message.id, "m1");
        assert_eq!(payload.conversation.id, "c1");
        assert!(payload.sender.is_none());
    }

    #[test]
    fn messages_read_payload_rejects_missing_count() {
        let data = serde_json::json!({
            "userId": "u1",
            "conversationId": "c1",
            "readAt": "2026-08-01T10:00:00Z"
        });
        assert!(serde_json::from_value::<MessagesReadPayload>(data).is_err());
    }
}
