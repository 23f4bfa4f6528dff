//! Translates inbound wire frames into domain events.
//!
//! Every frame is decoded as a whole: a payload missing a required field is
//! logged and dropped rather than surfaced half-parsed. Unknown event names
//! are ignored so the client stays forward compatible with server additions.

use std::sync::Arc;

use tracing::{debug, warn};

use tradepost_protocol::events;
use tradepost_protocol::{
    ConversationDeletedPayload, ErrorPayload, MessageDeletedPayload, MessageSentPayload,
    MessagesReadPayload, NewMessagePayload, PresencePayload, SendErrorPayload, ServerFrame,
    TypingPayload,
};

use crate::bus::EventBus;
use crate::error::classify_error;
use crate::event::RealtimeEvent;
use crate::membership::ConversationMembership;
use crate::outbound::OutboundActions;

pub struct BusinessEventRouter {
    bus: Arc<EventBus>,
    membership: Arc<ConversationMembership>,
    outbound: Arc<OutboundActions>,
}

impl BusinessEventRouter {
    pub(crate) fn new(
        bus: Arc<EventBus>,
        membership: Arc<ConversationMembership>,
        outbound: Arc<OutboundActions>,
    ) -> Self {
        Self {
            bus,
            membership,
            outbound,
        }
    }

    /// Route one server frame to its domain event, if it decodes.
    pub(crate) fn handle_frame(&self, frame: &ServerFrame) {
        match frame.event.as_str() {
            events::NEW_MESSAGE => self.decoded(frame, |payload: NewMessagePayload| {
                let conversation_id = payload.conversation.id.clone();
                self.bus.emit(&RealtimeEvent::NewMessage {
                    message: payload.message,
                    conversation: payload.conversation,
                    sender: payload.sender,
                    timestamp: payload.timestamp,
                });
                // Messages for the conversation on screen are read the
                // moment they arrive.
                if self.membership.is_active(&conversation_id) {
                    if let Err(error) = self.outbound.mark_messages_read(&conversation_id) {
                        debug!(conversation_id, %error, "failed to auto-mark messages read");
                    }
                }
            }),
            events::MESSAGE_SENT => self.decoded(frame, |payload: MessageSentPayload| {
                self.bus.emit(&RealtimeEvent::MessageSent {
                    message: payload.message,
                    client_correlation_id: payload.client_correlation_id,
                });
            }),
            events::MESSAGE_SEND_ERROR => self.decoded(frame, |payload: SendErrorPayload| {
                let raw = payload
                    .error
                    .unwrap_or_else(|| "message delivery failed".to_string());
                self.bus.emit(&RealtimeEvent::MessageSendError {
                    error: classify_error(&raw),
                    client_correlation_id: payload.client_correlation_id,
                });
            }),
            events::MESSAGES_READ => self.decoded(frame, |payload: MessagesReadPayload| {
                self.bus.emit(&RealtimeEvent::MessagesRead {
                    user_id: payload.user_id,
                    conversation_id: payload.conversation_id,
                    read_count: payload.read_count,
                    read_at: payload.read_at,
                });
            }),
            events::MESSAGE_DELETED => self.decoded(frame, |payload: MessageDeletedPayload| {
                self.bus.emit(&RealtimeEvent::MessageDeleted {
                    message_id: payload.message_id,
                    delete_for_everyone: payload.delete_for_everyone,
                    deleted_by: payload.deleted_by,
                    deleted_at: payload.deleted_at,
                });
            }),
            events::CONVERSATION_DELETED => {
                self.decoded(frame, |payload: ConversationDeletedPayload| {
                    self.membership.evict(&payload.conversation_id);
                    self.bus.emit(&RealtimeEvent::ConversationDeleted {
                        conversation_id: payload.conversation_id,
                        deleted_by: payload.deleted_by,
                    });
                });
            }
            events::USER_TYPING | events::USER_STOP_TYPING => {
                let started = frame.event == events::USER_TYPING;
                self.decoded(frame, |payload: TypingPayload| {
                    self.bus.emit(&RealtimeEvent::TypingChanged {
                        conversation_id: payload.conversation_id,
                        user_id: payload.user_id,
                        user: payload.user,
                        timestamp: payload.timestamp,
                        started,
                    });
                });
            }
            events::USER_ONLINE | events::USER_OFFLINE => {
                let online = frame.event == events::USER_ONLINE;
                self.decoded(frame, |payload: PresencePayload| {
                    self.bus.emit(&RealtimeEvent::PresenceChanged {
                        user_id: payload.user_id,
                        user: payload.user,
                        online,
                        since: payload.since,
                    });
                });
            }
            events::ERROR => self.decoded(frame, |payload: ErrorPayload| {
                let raw = payload
                    .message
                    .unwrap_or_else(|| "unspecified server error".to_string());
                self.bus.emit(&RealtimeEvent::Error(classify_error(&raw)));
            }),
            other => {
                debug!(event = other, "ignoring unrecognized event");
            }
        }
    }

    fn decoded<T, F>(&self, frame: &ServerFrame, handle: F)
    where
        T: serde::de::DeserializeOwned,
        F: FnOnce(T),
    {
        match frame.payload::<T>() {
            Ok(payload) => handle(payload),
            Err(error) => {
                warn!(event = frame.event, %error, "dropping malformed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::status::ConnectionShared;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tradepost_protocol::ClientFrame;

    struct Fixture {
        bus: Arc<EventBus>,
        membership: Arc<ConversationMembership>,
        router: BusinessEventRouter,
        outbound_rx: mpsc::Receiver<ClientFrame>,
    }

    fn fixture() -> Fixture {
        let shared = Arc::new(ConnectionShared::new());
        let bus = Arc::new(EventBus::new());
        let outbound = Arc::new(OutboundActions::new(Arc::clone(&shared), Arc::clone(&bus)));
        let membership = Arc::new(ConversationMembership::new(Arc::clone(&outbound)));
        let (tx, outbound_rx) = mpsc::channel(8);
        shared.mark_connected(None);
        shared.set_sender(tx);
        Fixture {
            bus: Arc::clone(&bus),
            membership: Arc::clone(&membership),
            router: BusinessEventRouter::new(bus, membership, outbound),
            outbound_rx,
        }
    }

    fn frame(event: &str, data: serde_json::Value) -> ServerFrame {
        ServerFrame {
            event: event.to_string(),
            data,
        }
    }

    fn new_message_frame(conversation_id: &str) -> ServerFrame {
        frame(
            events::NEW_MESSAGE,
            json!({
                "message": {"_id": "m1", "text": "hi"},
                "conversation": {"_id": conversation_id, "productId": "p1"}
            }),
        )
    }

    #[tokio::test]
    async fn new_message_in_active_conversation_marks_read() {
        let mut fx = fixture();
        fx.membership.join("c1").unwrap();
        let _ = fx.outbound_rx.try_recv();

        fx.router.handle_frame(&new_message_frame("c1"));

        match fx.outbound_rx.try_recv() {
            Ok(ClientFrame::MarkMessagesRead { conversation_id }) => {
                assert_eq!(conversation_id, "c1");
            }
            other => panic!("expected mark_messages_read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn new_message_in_other_conversation_does_not_mark_read() {
        let mut fx = fixture();
        fx.membership.join("c1").unwrap();
        let _ = fx.outbound_rx.try_recv();

        fx.router.handle_frame(&new_message_frame("c2"));
        assert!(fx.outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_new_message_is_dropped_entirely() {
        let fx = fixture();
        let emitted = Arc::new(AtomicUsize::new(0));
        let emitted_clone = Arc::clone(&emitted);
        fx.bus.on(EventKind::NewMessage, move |_| {
            emitted_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Missing the required conversation reference.
        fx.router.handle_frame(&frame(
            events::NEW_MESSAGE,
            json!({"message": {"_id": "m1", "text": "hi"}}),
        ));
        assert_eq!(emitted.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn typing_events_set_started_flag_from_event_name() {
        let fx = fixture();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        fx.bus.on(EventKind::TypingChanged, move |event| {
            if let RealtimeEvent::TypingChanged { started, .. } = event {
                seen_clone.lock().unwrap().push(*started);
            }
        });

        let data = json!({
            "conversationId": "c1",
            "userId": "u2",
            "user": {"id": "u2", "name": "Sam"},
            "timestamp": "2026-08-01T10:00:00Z"
        });
        fx.router.handle_frame(&frame(events::USER_TYPING, data.clone()));
        fx.router.handle_frame(&frame(events::USER_STOP_TYPING, data));

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test]
    async fn conversation_deleted_evicts_active_membership() {
        let fx = fixture();
        fx.membership.join("c1").unwrap();

        fx.router.handle_frame(&frame(
            events::CONVERSATION_DELETED,
            json!({"conversationId": "c1", "deletedBy": "u2"}),
        ));
        assert!(fx.membership.current().is_none());
    }

    #[tokio::test]
    async fn server_error_frame_is_classified() {
        let fx = fixture();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        fx.bus.on(EventKind::Error, move |event| {
            if let RealtimeEvent::Error(classified) = event {
                seen_clone.lock().unwrap().push(classified.kind);
            }
        });

        fx.router.handle_frame(&frame(
            events::ERROR,
            json!({"message": "internal server error"}),
        ));

        use crate::error::ErrorKind;
        assert_eq!(*seen.lock().unwrap(), vec![ErrorKind::Server]);
    }

    #[tokio::test]
    async fn unknown_event_is_ignored() {
        let fx = fixture();
        fx.router
            .handle_frame(&frame("galactic_takeover", json!({"anything": true})));
    }
}
