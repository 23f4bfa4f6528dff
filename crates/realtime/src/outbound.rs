//! Outbound commands toward the realtime server.
//!
//! Every action here fails fast when the connection is down. Nothing is
//! queued for later delivery: the caller owns retry policy, and a send
//! failure for a message additionally surfaces as a [`RealtimeEvent`] so
//! optimistic UI state can be rolled back.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use tradepost_protocol::{ClientFrame, MessageAttachment, SendMessageFrame};

use crate::bus::EventBus;
use crate::error::{RealtimeError, RealtimeResult};
use crate::event::RealtimeEvent;
use crate::status::ConnectionShared;

/// A message the caller wants to send, before it becomes a wire frame.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub text: String,
    pub product_id: String,
    pub conversation_id: Option<String>,
    pub reply_to: Option<String>,
    /// Caller-chosen id echoed back in acknowledgements; generated when
    /// absent so every send can be correlated.
    pub client_correlation_id: Option<String>,
    pub attachment: Option<MessageAttachment>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            product_id: product_id.into(),
            conversation_id: None,
            reply_to: None,
            client_correlation_id: None,
            attachment: None,
        }
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.client_correlation_id = Some(id.into());
        self
    }

    pub fn with_attachment(mut self, attachment: MessageAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Client-to-server command surface.
pub struct OutboundActions {
    shared: Arc<ConnectionShared>,
    bus: Arc<EventBus>,
}

impl OutboundActions {
    pub(crate) fn new(shared: Arc<ConnectionShared>, bus: Arc<EventBus>) -> Self {
        Self { shared, bus }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Hand a frame to the transport's outbound channel.
    pub(crate) fn send(&self, frame: ClientFrame) -> RealtimeResult<()> {
        if !self.shared.is_connected() {
            return Err(RealtimeError::NotConnected);
        }
        let sender = self.shared.sender().ok_or(RealtimeError::NotConnected)?;
        debug!(event = frame.event_name(), "sending frame");
        sender
            .try_send(frame)
            .map_err(|_| RealtimeError::ChannelClosed)
    }

    /// Send a chat message, returning its correlation id.
    ///
    /// The attachment, when present, also sets the wire `messageType`; plain
    /// text sends omit both keys. When disconnected the failure is reported
    /// twice on purpose: as the returned error and as a `MessageSendError`
    /// event carrying the correlation id.
    pub fn send_message(&self, message: OutgoingMessage) -> RealtimeResult<String> {
        let correlation_id = message
            .client_correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let frame = ClientFrame::SendMessage(SendMessageFrame {
            text: message.text,
            product_id: message.product_id,
            reply_to: message.reply_to,
            conversation_id: message.conversation_id,
            client_correlation_id: Some(correlation_id.clone()),
            message_type: message
                .attachment
                .as_ref()
                .map(|attachment| attachment.kind.message_kind()),
            attachment: message.attachment,
        });

        match self.send(frame) {
            Ok(()) => Ok(correlation_id),
            Err(error) => {
                self.bus.emit(&RealtimeEvent::MessageSendError {
                    error: error.classified(),
                    client_correlation_id: Some(correlation_id),
                });
                Err(error)
            }
        }
    }

    pub(crate) fn join_frame(&self, conversation_id: &str) -> RealtimeResult<()> {
        self.send(ClientFrame::JoinConversation {
            conversation_id: conversation_id.to_string(),
        })
    }

    pub(crate) fn leave_frame(&self, conversation_id: &str) -> RealtimeResult<()> {
        self.send(ClientFrame::LeaveConversation {
            conversation_id: conversation_id.to_string(),
        })
    }

    pub fn typing_start(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.send(ClientFrame::TypingStart {
            conversation_id: conversation_id.into(),
        })
    }

    pub fn typing_stop(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.send(ClientFrame::TypingStop {
            conversation_id: conversation_id.into(),
        })
    }

    pub fn mark_messages_read(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        self.send(ClientFrame::MarkMessagesRead {
            conversation_id: conversation_id.into(),
        })
    }

    pub fn delete_message(
        &self,
        message_id: impl Into<String>,
        delete_for_everyone: bool,
    ) -> RealtimeResult<()> {
        self.send(ClientFrame::DeleteMessage {
            message_id: message_id.into(),
            delete_for_everyone: delete_for_everyone.then_some(true),
        })
    }

    pub fn create_conversation(
        &self,
        product_id: impl Into<String>,
        participant_id: Option<String>,
    ) -> RealtimeResult<()> {
        self.send(ClientFrame::CreateConversation {
            product_id: product_id.into(),
            participant_id,
        })
    }

    pub fn get_online_users(&self) -> RealtimeResult<()> {
        self.send(ClientFrame::GetOnlineUsers)
    }

    pub fn ping(&self) -> RealtimeResult<()> {
        self.send(ClientFrame::Ping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    fn actions() -> (Arc<ConnectionShared>, Arc<EventBus>, OutboundActions) {
        let shared = Arc::new(ConnectionShared::new());
        let bus = Arc::new(EventBus::new());
        let actions = OutboundActions::new(Arc::clone(&shared), Arc::clone(&bus));
        (shared, bus, actions)
    }

    #[test]
    fn send_fails_fast_when_disconnected() {
        let (_shared, _bus, actions) = actions();
        assert_eq!(actions.ping(), Err(RealtimeError::NotConnected));
    }

    #[test]
    fn send_message_emits_error_event_when_disconnected() {
        let (_shared, bus, actions) = actions();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        bus.on(EventKind::MessageSendError, move |event| {
            if let RealtimeEvent::MessageSendError {
                client_correlation_id,
                ..
            } = event
            {
                seen_clone
                    .lock()
                    .unwrap()
                    .push(client_correlation_id.clone());
            }
        });

        let message =
            OutgoingMessage::text("hello", "p1").with_correlation_id("corr-7");
        assert!(actions.send_message(message).is_err());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), [Some("corr-7".to_string())]);
    }

    #[tokio::test]
    async fn send_message_generates_correlation_id_when_absent() {
        let (shared, _bus, actions) = actions();
        let (tx, mut rx) = mpsc::channel(8);
        shared.mark_connected(None);
        shared.set_sender(tx);

        let correlation_id = actions
            .send_message(OutgoingMessage::text("hi", "p1"))
            .expect("send should succeed while connected");
        assert!(!correlation_id.is_empty());

        let frame = rx.recv().await.expect("frame should be written");
        match frame {
            ClientFrame::SendMessage(sent) => {
                assert_eq!(sent.client_correlation_id.as_deref(), Some(correlation_id.as_str()));
                assert!(sent.message_type.is_none());
                assert!(sent.attachment.is_none());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn attachment_sets_message_type() {
        use tradepost_protocol::AttachmentType;

        let (shared, _bus, actions) = actions();
        let (tx, mut rx) = mpsc::channel(8);
        shared.mark_connected(None);
        shared.set_sender(tx);

        let attachment =
            MessageAttachment::from_bytes(AttachmentType::Image, "image/png", "a.png", b"png");
        actions
            .send_message(OutgoingMessage::text("photo", "p1").with_attachment(attachment))
            .expect("send should succeed while connected");

        match rx.recv().await.expect("frame should be written") {
            ClientFrame::SendMessage(sent) => {
                assert_eq!(
                    sent.message_type,
                    Some(AttachmentType::Image.message_kind())
                );
                assert!(sent.attachment.is_some());
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
