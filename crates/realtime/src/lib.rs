//! Realtime messaging and presence client core for the Tradepost
//! marketplace.
//!
//! The [`RealtimeClient`] holds one authenticated socket connection to the
//! realtime server, turns inbound wire frames into typed [`RealtimeEvent`]s
//! for UI subscribers, and exposes fail-fast outbound actions for messaging,
//! typing indicators, and presence. Connection loss is recovered with capped
//! exponential backoff; a manual disconnect stays down until an explicit
//! reconnect.

pub mod bus;
pub mod client;
pub mod connection;
pub mod error;
pub mod event;
pub mod membership;
pub mod outbound;
pub mod push;
pub mod status;
pub mod telemetry;
pub mod token;
pub mod transport;

mod router;

pub use bus::{EventBus, Subscription};
pub use client::RealtimeClient;
pub use connection::ConnectionManager;
pub use error::{classify_error, ClassifiedError, ErrorKind, RealtimeError, RealtimeResult};
pub use event::{EventKind, RealtimeEvent};
pub use membership::ConversationMembership;
pub use outbound::{OutboundActions, OutgoingMessage};
pub use push::{DevicePlatform, PushRegistrar};
pub use status::{ConnectionState, ConnectionStatus};
pub use token::TokenSource;
pub use transport::{ConnectRequest, Transport, TransportEvent, WebSocketTransport};
