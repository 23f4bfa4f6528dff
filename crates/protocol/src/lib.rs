//! # Tradepost Protocol Crate
//!
//! This crate defines the wire protocol spoken between the marketplace
//! realtime server and its clients: event names, the inbound frame envelope,
//! typed payloads, and the outbound command frames.
//!
//! ## Architecture
//!
//! - **Events**: wire event name constants for inbound and outbound frames
//! - **Entities**: shared message/conversation/user payload structs
//! - **Inbound**: the `ServerFrame` envelope plus per-event payload types
//! - **Outbound**: the `ClientFrame` command enum
//!
//! Inbound frames deliberately keep their payload as raw JSON until the
//! realtime layer validates them: an unrecognized event name must be
//! ignorable, and a recognized event with a malformed payload must be
//! droppable as a whole, without partial decoding.

pub mod entities;
pub mod events;
pub mod inbound;
pub mod outbound;

// Re-export main types for convenience
pub use entities::{
    AttachmentType, ChatMessage, ConversationRef, MessageAttachment, MessageKind, UserSummary,
};
pub use inbound::{
    ConnectedPayload, ConversationDeletedPayload, ErrorPayload, MessageDeletedPayload,
    MessageSentPayload, MessagesReadPayload, NewMessagePayload, PresencePayload, SendErrorPayload,
    ServerFrame, TypingPayload,
};
pub use outbound::{ClientFrame, SendMessageFrame};
