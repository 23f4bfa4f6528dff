//! Tracks which conversation the user is currently viewing.
//!
//! The client keeps at most one active conversation reference: joining a
//! new one supersedes the previous reference without sending a leave for
//! it. The active conversation drives automatic mark-as-read when its
//! messages arrive.

use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::error::{RealtimeError, RealtimeResult};
use crate::outbound::OutboundActions;

pub struct ConversationMembership {
    current: Mutex<Option<String>>,
    outbound: Arc<OutboundActions>,
}

impl ConversationMembership {
    pub(crate) fn new(outbound: Arc<OutboundActions>) -> Self {
        Self {
            current: Mutex::new(None),
            outbound,
        }
    }

    /// The conversation the user is currently viewing, if any.
    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .expect("membership state poisoned")
            .clone()
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.current
            .lock()
            .expect("membership state poisoned")
            .as_deref()
            == Some(conversation_id)
    }

    /// Switch the active conversation.
    ///
    /// The previous reference is superseded, not left: no leave frame is
    /// sent for it. While disconnected the whole operation is a no-op: no
    /// frame is sent and the active conversation is left unchanged, on the
    /// grounds that a half-applied switch is worse than none.
    pub fn join(&self, conversation_id: impl Into<String>) -> RealtimeResult<()> {
        let conversation_id = conversation_id.into();

        if !self.outbound.is_connected() {
            warn!(
                conversation_id,
                "ignoring join while disconnected, active conversation unchanged"
            );
            return Ok(());
        }

        let mut current = self.current.lock().expect("membership state poisoned");
        if current.as_deref() == Some(conversation_id.as_str()) {
            debug!(conversation_id, "already in conversation");
            return Ok(());
        }

        self.outbound.join_frame(&conversation_id)?;
        *current = Some(conversation_id);
        Ok(())
    }

    /// Leave a conversation room.
    ///
    /// With an explicit id the leave frame is sent for that room and the
    /// active reference is cleared only when it matches. Without one the
    /// active conversation, if any, is left.
    pub fn leave(&self, conversation_id: Option<String>) -> RealtimeResult<()> {
        let target = {
            let mut current = self.current.lock().expect("membership state poisoned");
            let target = conversation_id.or_else(|| current.clone());
            if current.as_deref() == target.as_deref() {
                current.take();
            }
            target
        };
        match target {
            Some(conversation_id) => match self.outbound.leave_frame(&conversation_id) {
                Ok(()) | Err(RealtimeError::NotConnected) => Ok(()),
                Err(error) => Err(error),
            },
            None => Ok(()),
        }
    }

    /// Forget local membership without sending any frames. Used when the
    /// connection is torn down and rooms no longer exist server-side.
    pub(crate) fn clear(&self) {
        self.current
            .lock()
            .expect("membership state poisoned")
            .take();
    }

    /// Re-enter the active conversation's room on a fresh connection.
    pub(crate) fn rejoin(&self) {
        if let Some(conversation_id) = self.current() {
            if let Err(error) = self.outbound.join_frame(&conversation_id) {
                warn!(conversation_id, %error, "failed to rejoin conversation after reconnect");
            }
        }
    }

    /// Drop membership locally when the server deletes the conversation.
    pub(crate) fn evict(&self, conversation_id: &str) {
        let mut current = self.current.lock().expect("membership state poisoned");
        if current.as_deref() == Some(conversation_id) {
            current.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::status::ConnectionShared;
    use tokio::sync::mpsc;
    use tradepost_protocol::ClientFrame;

    fn membership_with_channel() -> (
        Arc<ConnectionShared>,
        ConversationMembership,
        mpsc::Receiver<ClientFrame>,
    ) {
        let shared = Arc::new(ConnectionShared::new());
        let bus = Arc::new(EventBus::new());
        let outbound = Arc::new(OutboundActions::new(Arc::clone(&shared), bus));
        let (tx, rx) = mpsc::channel(8);
        shared.mark_connected(None);
        shared.set_sender(tx);
        (Arc::clone(&shared), ConversationMembership::new(outbound), rx)
    }

    #[tokio::test]
    async fn joining_second_conversation_supersedes_without_leaving() {
        let (_shared, membership, mut rx) = membership_with_channel();

        membership.join("c1").unwrap();
        membership.join("c2").unwrap();

        let frames: Vec<ClientFrame> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            frames,
            vec![
                ClientFrame::JoinConversation {
                    conversation_id: "c1".to_string()
                },
                ClientFrame::JoinConversation {
                    conversation_id: "c2".to_string()
                },
            ]
        );
        assert_eq!(membership.current().as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn rejoining_same_conversation_sends_nothing() {
        let (_shared, membership, mut rx) = membership_with_channel();

        membership.join("c1").unwrap();
        membership.join("c1").unwrap();

        let frames: Vec<ClientFrame> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(frames.len(), 1);
    }

    #[tokio::test]
    async fn join_while_disconnected_changes_nothing() {
        let (shared, membership, mut rx) = membership_with_channel();
        membership.join("c1").unwrap();
        let _ = rx.try_recv();

        shared.mark_disconnected();
        membership.join("c2").unwrap();

        assert_eq!(membership.current().as_deref(), Some("c1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn leave_while_disconnected_clears_local_state() {
        let (shared, membership, _rx) = membership_with_channel();
        membership.join("c1").unwrap();

        shared.mark_disconnected();
        membership.leave(None).unwrap();
        assert!(membership.current().is_none());
    }

    #[tokio::test]
    async fn leaving_another_conversation_keeps_the_active_one() {
        let (_shared, membership, mut rx) = membership_with_channel();
        membership.join("c1").unwrap();
        let _ = rx.try_recv();

        membership.leave(Some("c9".to_string())).unwrap();

        assert_eq!(
            rx.try_recv(),
            Ok(ClientFrame::LeaveConversation {
                conversation_id: "c9".to_string()
            })
        );
        assert_eq!(membership.current().as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn leaving_the_active_conversation_by_id_clears_it() {
        let (_shared, membership, mut rx) = membership_with_channel();
        membership.join("c1").unwrap();
        let _ = rx.try_recv();

        membership.leave(Some("c1".to_string())).unwrap();

        assert_eq!(
            rx.try_recv(),
            Ok(ClientFrame::LeaveConversation {
                conversation_id: "c1".to_string()
            })
        );
        assert!(membership.current().is_none());
    }

    #[tokio::test]
    async fn evict_only_drops_matching_conversation() {
        let (_shared, membership, _rx) = membership_with_channel();
        membership.join("c1").unwrap();

        membership.evict("c2");
        assert_eq!(membership.current().as_deref(), Some("c1"));

        membership.evict("c1");
        assert!(membership.current().is_none());
    }
}
