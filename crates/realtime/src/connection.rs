//! Connection lifecycle: authentication, single-flight connect, and
//! automatic reconnection with capped exponential backoff.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tradepost_config::RealtimeConfig;
use tradepost_protocol::events;
use tradepost_protocol::{ConnectedPayload, ErrorPayload};

use crate::bus::EventBus;
use crate::error::{classify_error, ClassifiedError, ErrorKind, RealtimeError, RealtimeResult};
use crate::event::RealtimeEvent;
use crate::membership::ConversationMembership;
use crate::router::BusinessEventRouter;
use crate::status::{ConnectionShared, ConnectionState, ConnectionStatus};
use crate::token::TokenSource;
use crate::transport::{ConnectRequest, Transport, TransportEvent};

type ConnectOutcome = Option<RealtimeResult<()>>;

/// Owns the socket lifecycle.
///
/// All entry points are safe to call from any task. Concurrent `connect`
/// calls are collapsed into a single attempt whose outcome every caller
/// receives; a timed-out attempt releases the single-flight slot so the next
/// call starts fresh.
pub struct ConnectionManager {
    config: RealtimeConfig,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenSource>,
    bus: Arc<EventBus>,
    shared: Arc<ConnectionShared>,
    membership: Arc<ConversationMembership>,
    router: Arc<BusinessEventRouter>,
    // Back-reference for handing clones to spawned tasks.
    weak_self: Weak<Self>,
    in_flight: TokioMutex<Option<watch::Receiver<ConnectOutcome>>>,
    event_task: StdMutex<Option<JoinHandle<()>>>,
    reconnect_task: StdMutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: RealtimeConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenSource>,
        bus: Arc<EventBus>,
        shared: Arc<ConnectionShared>,
        membership: Arc<ConversationMembership>,
        router: Arc<BusinessEventRouter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            config,
            transport,
            tokens,
            bus,
            shared,
            membership,
            router,
            weak_self: weak_self.clone(),
            in_flight: TokioMutex::new(None),
            event_task: StdMutex::new(None),
            reconnect_task: StdMutex::new(None),
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        let mut status = self.shared.snapshot();
        status.current_conversation_id = self.membership.current();
        status
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Establish the connection, or join an attempt already in progress.
    ///
    /// Resolves `Ok` once the transport is open; the server's `connected`
    /// acknowledgement fills in the server-confirmed identity afterwards.
    /// Calling while already connected resolves immediately, updating the
    /// user id when one is supplied.
    pub async fn connect(&self, user_id: Option<String>) -> RealtimeResult<()> {
        if let Some(user_id) = user_id {
            self.shared.set_user_id(user_id);
        }
        if self.shared.is_connected() {
            debug!("connect requested while already connected");
            return Ok(());
        }

        let leader_tx = {
            let mut in_flight = self.in_flight.lock().await;
            // The attempt we raced against may have completed while we
            // waited for the lock; opening another transport here would
            // clobber the healthy connection's sender.
            if self.shared.is_connected() {
                return Ok(());
            }
            if let Some(receiver) = in_flight.as_ref() {
                let mut receiver = receiver.clone();
                drop(in_flight);
                return await_outcome(&mut receiver).await;
            }
            let (tx, rx) = watch::channel(None);
            *in_flight = Some(rx);
            tx
        };

        let result = self.run_connect_attempt().await;

        {
            let mut in_flight = self.in_flight.lock().await;
            *in_flight = None;
        }
        // Followers see the outcome even if none are waiting yet.
        let _ = leader_tx.send(Some(result.clone()));
        result
    }

    async fn run_connect_attempt(&self) -> RealtimeResult<()> {
        if self.shared.state() != ConnectionState::Reconnecting {
            self.shared.set_state(ConnectionState::Connecting);
        }

        let timeout = Duration::from_secs(self.config.connect_timeout_seconds);
        let result = match tokio::time::timeout(timeout, self.establish()).await {
            Ok(result) => result,
            Err(_) => Err(RealtimeError::Timeout(timeout)),
        };

        if let Err(error) = &result {
            let classified = error.classified();
            warn!(kind = ?classified.kind, message = classified.message, "connect attempt failed");
            if classified.kind == ErrorKind::Auth {
                self.shared.set_state(ConnectionState::Failed);
                self.bus.emit(&RealtimeEvent::AuthError(classified));
            } else {
                let retryable = classified.retryable;
                self.bus.emit(&RealtimeEvent::ConnectError(classified));
                // A retryable failure of a caller-initiated attempt starts
                // the backoff loop; the loop's own failed attempts arrive
                // here in the Reconnecting state and must not restart it.
                if self.shared.state() != ConnectionState::Reconnecting {
                    if retryable && !self.shared.manual_disconnect() {
                        self.shared.set_state(ConnectionState::Reconnecting);
                        self.spawn_reconnect_loop();
                    } else {
                        self.shared.set_state(ConnectionState::Disconnected);
                    }
                }
            }
        }
        result
    }

    /// One connect attempt: token, dial, wait for the transport to open.
    async fn establish(&self) -> RealtimeResult<()> {
        let token = self.poll_token().await?;
        let endpoint = self.config.endpoint().to_string();
        info!(endpoint, "connecting to realtime server");

        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let mut events = self.transport.open(ConnectRequest {
            endpoint,
            token,
            outbound: outbound_rx,
        });

        match events.recv().await {
            Some(TransportEvent::Opened { socket_id }) => {
                self.shared.mark_connected(socket_id.clone());
                self.shared.set_sender(outbound_tx);
                info!(?socket_id, "realtime connection established");
                self.bus.emit(&RealtimeEvent::Connected {
                    user_id: self.shared.user_id(),
                    socket_id,
                });
                self.membership.rejoin();
                self.spawn_event_loop(events);
                Ok(())
            }
            Some(TransportEvent::Errored { message }) => Err(classify_error(&message).into()),
            Some(TransportEvent::Closed { reason }) => Err(RealtimeError::Network(
                reason.unwrap_or_else(|| "connection closed before opening".to_string()),
            )),
            Some(TransportEvent::Frame(frame)) => Err(RealtimeError::Unknown(format!(
                "received {} frame before the connection opened",
                frame.event
            ))),
            None => Err(RealtimeError::ChannelClosed),
        }
    }

    /// Poll the token source a few times; secure storage can lag app start.
    async fn poll_token(&self) -> RealtimeResult<String> {
        let attempts = self.config.token_poll_attempts.max(1);
        let delay = Duration::from_millis(self.config.token_poll_delay_ms);
        for attempt in 1..=attempts {
            if let Some(token) = self.tokens.access_token() {
                return Ok(token);
            }
            debug!(attempt, "no access token yet");
            if attempt < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Err(RealtimeError::Auth("no access token available".to_string()))
    }

    fn spawn_event_loop(&self, events: mpsc::Receiver<TransportEvent>) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move { manager.run_event_loop(events).await });
        let mut slot = self.event_task.lock().expect("event task slot poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    async fn run_event_loop(self: Arc<Self>, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Frame(frame) => match frame.event.as_str() {
                    events::CONNECTED => match frame.payload::<ConnectedPayload>() {
                        Ok(payload) => {
                            debug!(user_id = payload.user_id, "server acknowledged connection");
                            self.shared
                                .update_identity(payload.user_id, payload.socket_id);
                        }
                        Err(error) => {
                            warn!(%error, "dropping malformed connected frame");
                        }
                    },
                    events::AUTH_ERROR => {
                        let message = frame
                            .payload::<ErrorPayload>()
                            .ok()
                            .and_then(|payload| payload.message)
                            .unwrap_or_else(|| "authentication rejected".to_string());
                        warn!(message, "server revoked authentication");
                        self.shared.clear_sender();
                        self.shared.set_state(ConnectionState::Failed);
                        self.bus.emit(&RealtimeEvent::AuthError(ClassifiedError::new(
                            ErrorKind::Auth,
                            message,
                            false,
                        )));
                        break;
                    }
                    _ => self.router.handle_frame(&frame),
                },
                TransportEvent::Closed { reason } => {
                    self.handle_transport_close(reason);
                    break;
                }
                TransportEvent::Errored { message } => {
                    self.handle_transport_error(message);
                    break;
                }
                TransportEvent::Opened { .. } => {
                    debug!("ignoring duplicate open notification");
                }
            }
        }
    }

    fn handle_transport_close(&self, reason: Option<String>) {
        self.shared.clear_sender();

        if self.shared.manual_disconnect() {
            debug!("transport closed after manual disconnect");
            return;
        }

        warn!(?reason, "realtime connection closed");
        self.shared.set_state(ConnectionState::Reconnecting);
        self.bus.emit(&RealtimeEvent::Disconnected {
            reason: reason.clone(),
        });

        // A server-initiated kick usually means a restart or a session
        // handover; a single delayed retry is enough.
        let peer_forced = reason
            .as_deref()
            .is_some_and(|reason| reason.contains("forced"));
        if peer_forced {
            self.spawn_single_retry();
        } else {
            self.spawn_reconnect_loop();
        }
    }

    fn handle_transport_error(&self, message: String) {
        self.shared.clear_sender();

        let classified = classify_error(&message);
        warn!(kind = ?classified.kind, message, "realtime connection errored");
        let retryable = classified.retryable;
        // Auth failures are surfaced distinctly so the caller knows to
        // refresh credentials rather than wait out a retry.
        if classified.kind == ErrorKind::Auth {
            self.shared.set_state(ConnectionState::Failed);
            self.bus.emit(&RealtimeEvent::AuthError(classified));
            return;
        }
        self.bus.emit(&RealtimeEvent::Error(classified));

        if self.shared.manual_disconnect() {
            return;
        }

        if retryable {
            self.shared.set_state(ConnectionState::Reconnecting);
            self.spawn_reconnect_loop();
        } else {
            self.shared.set_state(ConnectionState::Failed);
        }
    }

    fn spawn_single_retry(&self) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        let delay = Duration::from_millis(self.config.reconnect_base_delay_ms);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if manager.shared.manual_disconnect() {
                return;
            }
            if let Err(error) = manager.connect(None).await {
                warn!(%error, "retry after server-initiated close failed");
                manager.spawn_reconnect_loop();
            }
        });
        self.store_reconnect_task(handle);
    }

    fn spawn_reconnect_loop(&self) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        let handle = tokio::spawn(async move {
            loop {
                if manager.shared.manual_disconnect() || manager.shared.is_connected() {
                    return;
                }
                let attempt = manager.shared.next_reconnect_attempt();
                if attempt > manager.config.max_reconnect_attempts {
                    warn!(attempts = attempt - 1, "giving up on automatic reconnection");
                    manager.shared.set_state(ConnectionState::Failed);
                    manager.bus.emit(&RealtimeEvent::Error(ClassifiedError::new(
                        ErrorKind::Network,
                        "reconnection attempts exhausted",
                        false,
                    )));
                    return;
                }

                let delay = manager.backoff_delay(attempt);
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                tokio::time::sleep(delay).await;

                if manager.shared.manual_disconnect() {
                    return;
                }
                match manager.connect(None).await {
                    Ok(()) => return,
                    Err(error) => {
                        if !error.classified().retryable {
                            warn!(%error, "reconnection failed with a terminal error");
                            manager.shared.set_state(ConnectionState::Failed);
                            return;
                        }
                        manager.shared.set_state(ConnectionState::Reconnecting);
                    }
                }
            }
        });
        self.store_reconnect_task(handle);
    }

    fn store_reconnect_task(&self, handle: JoinHandle<()>) {
        let mut slot = self
            .reconnect_task
            .lock()
            .expect("reconnect task slot poisoned");
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
    }

    /// Exponential backoff with jitter: base doubles per attempt, clamped to
    /// the configured maximum, plus up to one base interval of random spread.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.reconnect_base_delay_ms.max(1);
        let shift = attempt.saturating_sub(1).min(20);
        let exponential = base.saturating_mul(1u64 << shift);
        let clamped = exponential.min(self.config.reconnect_max_delay_ms.max(base));
        let jitter = rand::thread_rng().gen_range(0..base);
        Duration::from_millis(clamped + jitter)
    }

    /// Tear the connection down and stay down until told otherwise.
    pub fn disconnect(&self) {
        info!("disconnecting realtime client");
        self.shared.set_manual_disconnect(true);

        let reconnect = self
            .reconnect_task
            .lock()
            .expect("reconnect task slot poisoned")
            .take();
        if let Some(handle) = reconnect {
            handle.abort();
        }
        let event_loop = self
            .event_task
            .lock()
            .expect("event task slot poisoned")
            .take();
        if let Some(handle) = event_loop {
            handle.abort();
        }

        let was_connected = self.shared.is_connected();
        // Dropping the sender closes the socket gracefully.
        self.shared.clear_sender();
        self.shared.mark_disconnected();
        self.membership.clear();

        if was_connected {
            self.bus.emit(&RealtimeEvent::Disconnected {
                reason: Some("disconnect requested".to_string()),
            });
        }
    }

    /// Explicit user-driven reconnect; clears the manual-disconnect latch
    /// and the attempt counter before trying again.
    pub async fn reconnect(&self) -> RealtimeResult<()> {
        self.shared.set_manual_disconnect(false);
        self.shared.reset_reconnect_attempts();
        self.connect(None).await
    }

    /// Called when the app returns to the foreground: resume the connection
    /// unless the user explicitly disconnected.
    pub fn on_app_foreground(&self) {
        if self.shared.is_connected() || self.shared.manual_disconnect() {
            return;
        }
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        debug!("app foregrounded while disconnected, reconnecting");
        tokio::spawn(async move {
            if let Err(error) = manager.connect(None).await {
                warn!(%error, "foreground reconnect failed");
            }
        });
    }
}

async fn await_outcome(receiver: &mut watch::Receiver<ConnectOutcome>) -> RealtimeResult<()> {
    match receiver.wait_for(|outcome| outcome.is_some()).await {
        Ok(outcome) => outcome.clone().unwrap_or(Err(RealtimeError::ChannelClosed)),
        Err(_) => Err(RealtimeError::ChannelClosed),
    }
}
