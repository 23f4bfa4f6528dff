//! Transport abstraction over the persistent socket connection.
//!
//! A [`Transport`] spawns one connection attempt per [`ConnectRequest`] and
//! reports its lifecycle on the returned channel. The production
//! implementation speaks WebSocket via tokio-tungstenite; tests substitute a
//! scripted transport. Event order on the channel matches arrival order on
//! the wire: this layer introduces no reordering.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use tradepost_protocol::{ClientFrame, ServerFrame};

/// Lifecycle events reported by a connection attempt.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection is established; frames may now flow.
    Opened { socket_id: Option<String> },
    /// A named event frame arrived from the server.
    Frame(ServerFrame),
    /// The connection closed, either by the peer or after our outbound
    /// channel was dropped.
    Closed { reason: Option<String> },
    /// The connection failed or broke with an error.
    Errored { message: String },
}

/// Everything a transport needs to dial one connection.
pub struct ConnectRequest {
    pub endpoint: String,
    pub token: String,
    /// Frames the connection owner wants written to the socket. Dropping the
    /// sending side tells the transport to close gracefully.
    pub outbound: mpsc::Receiver<ClientFrame>,
}

/// A factory for connection attempts.
///
/// `open` must return immediately; the attempt itself runs in a background
/// task and reports through the channel, starting with either `Opened` or
/// `Errored`.
pub trait Transport: Send + Sync + 'static {
    fn open(&self, request: ConnectRequest) -> mpsc::Receiver<TransportEvent>;
}

/// Production WebSocket transport.
pub struct WebSocketTransport;

impl Transport for WebSocketTransport {
    fn open(&self, request: ConnectRequest) -> mpsc::Receiver<TransportEvent> {
        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(run_connection(request, events_tx));
        events_rx
    }
}

async fn run_connection(request: ConnectRequest, events: mpsc::Sender<TransportEvent>) {
    let separator = if request.endpoint.contains('?') { '&' } else { '?' };
    let url = format!("{}{}token={}", request.endpoint, separator, request.token);

    let (stream, response) = match connect_async(url.as_str()).await {
        Ok(pair) => pair,
        Err(error) => {
            let _ = events
                .send(TransportEvent::Errored {
                    message: error.to_string(),
                })
                .await;
            return;
        }
    };

    let socket_id = response
        .headers()
        .get("x-socket-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    if events
        .send(TransportEvent::Opened { socket_id })
        .await
        .is_err()
    {
        // Receiver already gone (e.g. connect timeout); close quietly.
        return;
    }

    let (mut sink, mut stream) = stream.split();
    let mut outbound = request.outbound;

    loop {
        tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerFrame>(&text) {
                    Ok(frame) => {
                        if events.send(TransportEvent::Frame(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(%error, "dropping unparseable frame envelope");
                    }
                },
                Some(Ok(Message::Close(close))) => {
                    let reason = close.map(|frame| frame.reason.to_string());
                    let _ = events.send(TransportEvent::Closed { reason }).await;
                    break;
                }
                Some(Ok(_)) => {
                    // Binary and ping/pong control frames are not part of the
                    // protocol; keepalive is the application-level ping.
                }
                Some(Err(error)) => {
                    let _ = events
                        .send(TransportEvent::Errored { message: error.to_string() })
                        .await;
                    break;
                }
                None => {
                    let _ = events.send(TransportEvent::Closed { reason: None }).await;
                    break;
                }
            },
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    debug!(event = frame.event_name(), "writing outbound frame");
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(error) => {
                            warn!(%error, "failed to serialize outbound frame");
                            continue;
                        }
                    };
                    if let Err(error) = sink.send(Message::Text(text)).await {
                        let _ = events
                            .send(TransportEvent::Errored { message: error.to_string() })
                            .await;
                        break;
                    }
                }
                None => {
                    // Owner dropped the outbound sender: graceful shutdown.
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
        }
    }
}
