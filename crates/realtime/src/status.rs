//! Connection state shared between the manager, outbound actions, and tests.

use std::sync::Mutex;

use tokio::sync::mpsc;

use tradepost_protocol::ClientFrame;

/// Lifecycle of the realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Automatic recovery gave up; only an explicit reconnect leaves this.
    Failed,
}

/// Point-in-time snapshot of the connection, safe to hand to UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub socket_id: Option<String>,
    pub user_id: Option<String>,
    /// Filled in by the connection manager from the membership state.
    pub current_conversation_id: Option<String>,
    pub reconnect_attempts: u32,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

#[derive(Debug)]
struct StatusInner {
    state: ConnectionState,
    socket_id: Option<String>,
    user_id: Option<String>,
    reconnect_attempts: u32,
    manual_disconnect: bool,
}

impl Default for StatusInner {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            socket_id: None,
            user_id: None,
            reconnect_attempts: 0,
            manual_disconnect: false,
        }
    }
}

/// State shared by everything that touches the live connection.
///
/// The status mutex guards small plain data and is never held across an
/// await point. The sender slot holds the write half of the current
/// transport's outbound channel; clearing it drops the channel, which the
/// transport treats as a graceful close request.
pub struct ConnectionShared {
    status: Mutex<StatusInner>,
    sender: Mutex<Option<mpsc::Sender<ClientFrame>>>,
}

impl ConnectionShared {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(StatusInner::default()),
            sender: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> ConnectionStatus {
        let inner = self.status.lock().expect("connection status poisoned");
        ConnectionStatus {
            state: inner.state,
            socket_id: inner.socket_id.clone(),
            user_id: inner.user_id.clone(),
            current_conversation_id: None,
            reconnect_attempts: inner.reconnect_attempts,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status.lock().expect("connection status poisoned").state == ConnectionState::Connected
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.status.lock().expect("connection status poisoned").state
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.status.lock().expect("connection status poisoned").state = state;
    }

    pub(crate) fn mark_connected(&self, socket_id: Option<String>) {
        let mut inner = self.status.lock().expect("connection status poisoned");
        inner.state = ConnectionState::Connected;
        inner.socket_id = socket_id;
        inner.reconnect_attempts = 0;
    }

    pub(crate) fn mark_disconnected(&self) {
        let mut inner = self.status.lock().expect("connection status poisoned");
        inner.state = ConnectionState::Disconnected;
        inner.socket_id = None;
        inner.user_id = None;
        inner.reconnect_attempts = 0;
    }

    pub(crate) fn set_user_id(&self, user_id: String) {
        self.status
            .lock()
            .expect("connection status poisoned")
            .user_id = Some(user_id);
    }

    pub(crate) fn update_identity(&self, user_id: String, socket_id: Option<String>) {
        let mut inner = self.status.lock().expect("connection status poisoned");
        inner.user_id = Some(user_id);
        if socket_id.is_some() {
            inner.socket_id = socket_id;
        }
    }

    pub(crate) fn user_id(&self) -> Option<String> {
        self.status
            .lock()
            .expect("connection status poisoned")
            .user_id
            .clone()
    }

    pub(crate) fn manual_disconnect(&self) -> bool {
        self.status
            .lock()
            .expect("connection status poisoned")
            .manual_disconnect
    }

    pub(crate) fn set_manual_disconnect(&self, manual: bool) {
        self.status
            .lock()
            .expect("connection status poisoned")
            .manual_disconnect = manual;
    }

    /// Increment the reconnect attempt counter and return the new value.
    pub(crate) fn next_reconnect_attempt(&self) -> u32 {
        let mut inner = self.status.lock().expect("connection status poisoned");
        inner.reconnect_attempts += 1;
        inner.reconnect_attempts
    }

    pub(crate) fn reset_reconnect_attempts(&self) {
        self.status
            .lock()
            .expect("connection status poisoned")
            .reconnect_attempts = 0;
    }

    pub(crate) fn sender(&self) -> Option<mpsc::Sender<ClientFrame>> {
        self.sender.lock().expect("sender slot poisoned").clone()
    }

    pub(crate) fn set_sender(&self, sender: mpsc::Sender<ClientFrame>) {
        *self.sender.lock().expect("sender slot poisoned") = Some(sender);
    }

    pub(crate) fn clear_sender(&self) {
        *self.sender.lock().expect("sender slot poisoned") = None;
    }
}

impl Default for ConnectionShared {
    fn default() -> Self {
        Self::new()
    }
}
