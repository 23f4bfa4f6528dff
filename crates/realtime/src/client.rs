//! Top-level client tying the connection, routing, and outbound layers
//! together behind one handle.

use std::sync::Arc;

use tradepost_config::RealtimeConfig;

use crate::bus::{EventBus, Subscription};
use crate::connection::ConnectionManager;
use crate::error::RealtimeResult;
use crate::event::{EventKind, RealtimeEvent};
use crate::membership::ConversationMembership;
use crate::outbound::{OutboundActions, OutgoingMessage};
use crate::router::BusinessEventRouter;
use crate::status::{ConnectionShared, ConnectionStatus};
use crate::token::TokenSource;
use crate::transport::{Transport, WebSocketTransport};

/// Handle to the realtime messaging core.
///
/// Cheap to clone; all clones share one connection and one subscriber
/// registry.
#[derive(Clone)]
pub struct RealtimeClient {
    bus: Arc<EventBus>,
    membership: Arc<ConversationMembership>,
    outbound: Arc<OutboundActions>,
    manager: Arc<ConnectionManager>,
}

impl RealtimeClient {
    /// Build a client speaking WebSocket to the configured endpoint.
    pub fn new(config: RealtimeConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_transport(config, tokens, Arc::new(WebSocketTransport))
    }

    /// Build a client over a caller-supplied transport.
    pub fn with_transport(
        config: RealtimeConfig,
        tokens: Arc<dyn TokenSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let bus = Arc::new(EventBus::new());
        let shared = Arc::new(ConnectionShared::new());
        let outbound = Arc::new(OutboundActions::new(Arc::clone(&shared), Arc::clone(&bus)));
        let membership = Arc::new(ConversationMembership::new(Arc::clone(&outbound)));
        let router = Arc::new(BusinessEventRouter::new(
            Arc::clone(&bus),
            Arc::clone(&membership),
            Arc::clone(&outbound),
        ));
        let manager = ConnectionManager::new(
            config,
            transport,
            tokens,
            Arc::clone(&bus),
            shared,
            Arc::clone(&membership),
            router,
        );
        Self {
            bus,
            membership,
            outbound,
            manager,
        }
    }

    // Connection lifecycle.

    pub async fn connect(&self, user_id: Option<String>) -> RealtimeResult<()> {
        self.manager.connect(user_id).await
    }

    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    pub async fn reconnect(&self) -> RealtimeResult<()> {
        self.manager.reconnect().await
    }

    pub fn on_app_foreground(&self) {
        self.manager.on_app_foreground();
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    // Event subscriptions.

    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.on(kind, callback)
    }

    pub fn off(&self, subscription: Subscription) -> bool {
        self.bus.off(subscription)
    }

    pub fn off_all(&self, kind: EventKind) {
        self.bus.off_all(kind);
    }

    // Named helpers over `on` for the common subscriptions.

    pub fn on_connect(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::Connected, callback)
    }

    pub fn on_disconnect(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::Disconnected, callback)
    }

    pub fn on_connect_error(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::ConnectError, callback)
    }

    pub fn on_auth_error(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::AuthError, callback)
    }

    pub fn on_error(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::Error, callback)
    }

    pub fn on_new_message(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::NewMessage, callback)
    }

    pub fn on_message_sent(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::MessageSent, callback)
    }

    pub fn on_message_send_error(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::MessageSendError, callback)
    }

    pub fn on_messages_read(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::MessagesRead, callback)
    }

    pub fn on_message_deleted(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::MessageDeleted, callback)
    }

    pub fn on_conversation_deleted(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::ConversationDeleted, callback)
    }

    pub fn on_typing_changed(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::TypingChanged, callback)
    }

    pub fn on_presence_changed(
        &self,
        callback: impl Fn(&RealtimeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.on(EventKind::PresenceChanged, callback)
    }

    // Conversation membership.

    pub fn join_conversation(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.membership.join(conversation_id)
    }

    pub fn leave_conversation(&self, conversation_id: Option<String>) -> RealtimeResult<()> {
        self.membership.leave(conversation_id)
    }

    pub fn current_conversation(&self) -> Option<String> {
        self.membership.current()
    }

    // Outbound actions.

    pub fn send_message(&self, message: OutgoingMessage) -> RealtimeResult<String> {
        self.outbound.send_message(message)
    }

    pub fn typing_start(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.outbound.typing_start(conversation_id)
    }

    pub fn typing_stop(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.outbound.typing_stop(conversation_id)
    }

    pub fn mark_messages_read(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.outbound.mark_messages_read(conversation_id)
    }

    pub fn delete_message(
        &self,
        message_id: impl Into<String>,
        delete_for_everyone: bool,
    ) -> RealtimeResult<()> {
        self.outbound.delete_message(message_id, delete_for_everyone)
    }

    pub fn create_conversation(
        &self,
        product_id: impl Into<String>,
        participant_id: Option<String>,
    ) -> RealtimeResult<()> {
        self.outbound.create_conversation(product_id, participant_id)
    }

    pub fn get_online_users(&self) -> RealtimeResult<()> {
        self.outbound.get_online_users()
    }

    pub fn ping(&self) -> RealtimeResult<()> {
        self.outbound.ping()
    }
}
