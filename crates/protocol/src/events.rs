//! Wire event names exchanged over the realtime socket.
//!
//! Inbound names arrive in the `event` field of a [`crate::ServerFrame`];
//! outbound names are produced by the serde tagging on
//! [`crate::ClientFrame`] and listed here for reference and logging.

// Transport lifecycle. `connect`, `disconnect` and `connect_error` are
// surfaced by the transport itself rather than as payload frames, but they
// are part of the wire vocabulary.
pub const CONNECT: &str = "connect";
pub const DISCONNECT: &str = "disconnect";
pub const CONNECT_ERROR: &str = "connect_error";

// Inbound frames.
pub const CONNECTED: &str = "connected";
pub const AUTH_ERROR: &str = "auth_error";
pub const NEW_MESSAGE: &str = "new_message";
pub const MESSAGE_SENT: &str = "message_sent";
pub const MESSAGE_SEND_ERROR: &str = "message_send_error";
pub const MESSAGES_READ: &str = "messages_read";
pub const MESSAGE_DELETED: &str = "message_deleted";
pub const CONVERSATION_DELETED: &str = "conversation_deleted";
pub const USER_TYPING: &str = "user_typing";
pub const USER_STOP_TYPING: &str = "user_stop_typing";
pub const USER_ONLINE: &str = "user_online";
pub const USER_OFFLINE: &str = "user_offline";
pub const ERROR: &str = "error";

// Outbound frames.
pub const JOIN_CONVERSATION: &str = "join_conversation";
pub const LEAVE_CONVERSATION: &str = "leave_conversation";
pub const TYPING_START: &str = "typing_start";
pub const TYPING_STOP: &str = "typing_stop";
pub const MARK_MESSAGES_READ: &str = "mark_messages_read";
pub const SEND_MESSAGE: &str = "send_message";
pub const DELETE_MESSAGE: &str = "delete_message";
pub const CREATE_CONVERSATION: &str = "create_conversation";
pub const GET_ONLINE_USERS: &str = "get_online_users";
pub const PING: &str = "ping";
