//! Outbound command frames sent by the client.

use serde::{Deserialize, Serialize};

use crate::entities::{MessageAttachment, MessageKind};
use crate::events;

/// Commands sent from client to server.
///
/// Serializes to the wire envelope `{"event": "...", "data": {...}}`; the
/// variant name becomes the snake_case event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientFrame {
    /// Enter a conversation room to receive its live events.
    JoinConversation { conversation_id: String },
    /// Leave a conversation room.
    LeaveConversation { conversation_id: String },
    /// Show a typing indicator to the counterpart.
    TypingStart { conversation_id: String },
    /// Clear the typing indicator.
    TypingStop { conversation_id: String },
    /// Mark every unread message in the conversation as read.
    MarkMessagesRead { conversation_id: String },
    /// Send a message, optionally with an inline attachment.
    SendMessage(SendMessageFrame),
    /// Delete a message, optionally for both parties.
    DeleteMessage {
        message_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delete_for_everyone: Option<bool>,
    },
    /// Open a conversation about a product listing.
    CreateConversation {
        product_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant_id: Option<String>,
    },
    /// Request the current presence roster.
    GetOnlineUsers,
    /// Application-level keepalive.
    Ping,
}

impl ClientFrame {
    /// Wire event name for this command, for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientFrame::JoinConversation { .. } => events::JOIN_CONVERSATION,
            ClientFrame::LeaveConversation { .. } => events::LEAVE_CONVERSATION,
            ClientFrame::TypingStart { .. } => events::TYPING_START,
            ClientFrame::TypingStop { .. } => events::TYPING_STOP,
            ClientFrame::MarkMessagesRead { .. } => events::MARK_MESSAGES_READ,
            ClientFrame::SendMessage(_) => events::SEND_MESSAGE,
            ClientFrame::DeleteMessage { .. } => events::DELETE_MESSAGE,
            ClientFrame::CreateConversation { .. } => events::CREATE_CONVERSATION,
            ClientFrame::GetOnlineUsers => events::GET_ONLINE_USERS,
            ClientFrame::Ping => events::PING,
        }
    }
}

/// Payload of a `send_message` command.
///
/// `message_type` and `attachment` are present exactly when the message
/// carries an attachment; plain text messages omit both keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageFrame {
    pub text: String,
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<MessageAttachment>,
}
