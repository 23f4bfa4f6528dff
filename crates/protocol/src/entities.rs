//! Shared payload entities carried inside realtime frames.
//!
//! Field naming follows the server's JSON conventions: camelCase keys, and
//! Mongo-style `_id` identifiers on conversation references. Message and
//! user ids accept either `id` or `_id` on the way in.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message between a buyer and a seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<MessageAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Reference to the conversation a frame belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// Minimal user details attached to message, typing, and presence frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Kind of content a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

/// Kind of binary attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttachmentType {
    Image,
    File,
}

impl AttachmentType {
    /// The message kind an attachment of this type produces.
    pub fn message_kind(self) -> MessageKind {
        match self {
            AttachmentType::Image => MessageKind::Image,
            AttachmentType::File => MessageKind::File,
        }
    }
}

/// An attachment travelling inline with a message, base64-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttachment {
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    /// Base64-encoded file contents.
    pub data: String,
    pub mime_type: String,
    pub file_name: String,
}

impl MessageAttachment {
    /// Build an attachment from raw bytes, encoding them as base64.
    pub fn from_bytes(
        kind: AttachmentType,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            kind,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    /// Decode the base64 payload back into raw bytes.
    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.data)
    }
}
