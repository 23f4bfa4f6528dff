//! Domain events emitted to UI-level observers.

use chrono::{DateTime, Utc};

use tradepost_protocol::{ChatMessage, ConversationRef, UserSummary};

use crate::error::ClassifiedError;

/// Validated, typed events produced by the realtime layer.
///
/// Unlike raw wire frames these are guaranteed well-formed: the router drops
/// malformed frames before they get here. Events are created once, dispatched
/// synchronously to subscribers, and discarded.
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// The transport connection is up.
    Connected {
        user_id: Option<String>,
        socket_id: Option<String>,
    },
    /// The transport connection went down.
    Disconnected { reason: Option<String> },
    /// A connection attempt failed.
    ConnectError(ClassifiedError),
    /// The server rejected our credentials; no automatic retry follows.
    AuthError(ClassifiedError),
    /// A connection-level or server-reported error outside connect.
    Error(ClassifiedError),
    /// A new message arrived in a conversation.
    NewMessage {
        message: ChatMessage,
        conversation: ConversationRef,
        sender: Option<UserSummary>,
        timestamp: Option<DateTime<Utc>>,
    },
    /// The server acknowledged a message we sent.
    MessageSent {
        message: Option<ChatMessage>,
        client_correlation_id: Option<String>,
    },
    /// A message we sent could not be delivered. Carries the caller's
    /// correlation id so optimistic UI state can be reconciled.
    MessageSendError {
        error: ClassifiedError,
        client_correlation_id: Option<String>,
    },
    /// The counterpart read messages in a conversation.
    MessagesRead {
        user_id: String,
        conversation_id: String,
        read_count: u32,
        read_at: DateTime<Utc>,
    },
    /// A message was deleted.
    MessageDeleted {
        message_id: String,
        delete_for_everyone: bool,
        deleted_by: String,
        deleted_at: DateTime<Utc>,
    },
    /// A conversation was removed.
    ConversationDeleted {
        conversation_id: String,
        deleted_by: Option<String>,
    },
    /// The counterpart started or stopped typing.
    TypingChanged {
        conversation_id: String,
        user_id: String,
        user: UserSummary,
        timestamp: DateTime<Utc>,
        started: bool,
    },
    /// A user came online or went offline.
    PresenceChanged {
        user_id: String,
        user: UserSummary,
        online: bool,
        since: Option<DateTime<Utc>>,
    },
}

/// Discriminant used to key subscriber registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    ConnectError,
    AuthError,
    Error,
    NewMessage,
    MessageSent,
    MessageSendError,
    MessagesRead,
    MessageDeleted,
    ConversationDeleted,
    TypingChanged,
    PresenceChanged,
}

impl RealtimeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::Connected { .. } => EventKind::Connected,
            RealtimeEvent::Disconnected { .. } => EventKind::Disconnected,
            RealtimeEvent::ConnectError(_) => EventKind::ConnectError,
            RealtimeEvent::AuthError(_) => EventKind::AuthError,
            RealtimeEvent::Error(_) => EventKind::Error,
            RealtimeEvent::NewMessage { .. } => EventKind::NewMessage,
            RealtimeEvent::MessageSent { .. } => EventKind::MessageSent,
            RealtimeEvent::MessageSendError { .. } => EventKind::MessageSendError,
            RealtimeEvent::MessagesRead { .. } => EventKind::MessagesRead,
            RealtimeEvent::MessageDeleted { .. } => EventKind::MessageDeleted,
            RealtimeEvent::ConversationDeleted { .. } => EventKind::ConversationDeleted,
            RealtimeEvent::TypingChanged { .. } => EventKind::TypingChanged,
            RealtimeEvent::PresenceChanged { .. } => EventKind::PresenceChanged,
        }
    }
}
