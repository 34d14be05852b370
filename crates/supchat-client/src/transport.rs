use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use supchat_core::{SupchatError, SupchatResult};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

/// Connection state of the realtime transport. Owned exclusively by
/// [`Transport`]; other components only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No connection, and none being established.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Connection open; sends are valid.
    Connected,
    /// The last connection attempt failed. There is no automatic retry.
    Failed,
}

/// Lifecycle and inbound-data events emitted to the transport subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established; status is now `Connected`.
    Opened,
    /// An inbound text frame, unparsed.
    Frame(String),
    /// The connection ended; status is now `Disconnected`. There is no
    /// automatic reconnect — the fallback channel carries the rest of the
    /// session.
    Closed,
}

/// Shared state between the transport handle and its connection task.
///
/// `generation` advances on every `close()`. A connection task captures the
/// generation it was spawned under and re-checks it before every status
/// commit, so a task whose connection was torn down (or superseded by a
/// newer `open`) can never resurrect the transport.
struct ConnState {
    status: ConnectionStatus,
    outbound: Option<mpsc::Sender<String>>,
    generation: u64,
}

/// The single realtime WebSocket connection bound to a session.
///
/// `open` spawns a connection task that owns the socket; inbound frames and
/// lifecycle changes are forwarded through a `tokio::sync::mpsc` channel in
/// delivery order. At most one connection is live at a time: `open` while
/// `Connecting`/`Connected` is a no-op.
pub struct Transport {
    ws_origin: String,
    state: Arc<Mutex<ConnState>>,
    event_tx: mpsc::Sender<TransportEvent>,
    event_rx: Option<mpsc::Receiver<TransportEvent>>,
}

impl Transport {
    /// Create a new `Transport`.
    ///
    /// * `ws_origin` – Realtime origin, e.g. `wss://support.example.com`.
    /// * `event_buffer` – Capacity of the internal mpsc event buffer.
    pub fn new(ws_origin: impl Into<String>, event_buffer: usize) -> Self {
        let (event_tx, event_rx) = mpsc::channel(event_buffer);
        Self {
            ws_origin: ws_origin.into().trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(ConnState {
                status: ConnectionStatus::Disconnected,
                outbound: None,
                generation: 0,
            })),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the receiving half of the event channel.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.event_rx.take()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().status
    }

    /// Initiate the connection for the given session.
    ///
    /// Returns immediately; the outcome arrives as events. Calling `open`
    /// while a connection is `Connecting` or `Connected` is a no-op.
    pub fn open(&self, session_id: &str) {
        let my_gen = {
            let mut state = self.state.lock();
            if matches!(
                state.status,
                ConnectionStatus::Connecting | ConnectionStatus::Connected
            ) {
                debug!("Realtime connection already live, open is a no-op");
                return;
            }
            state.status = ConnectionStatus::Connecting;
            state.generation
        };

        let url = format!("{}/ws/support/conversation/{session_id}/", self.ws_origin);
        let state = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();
        drop(tokio::spawn(run_connection(url, my_gen, state, event_tx)));
    }

    /// Send a raw payload over the realtime connection.
    ///
    /// Valid only while `Connected`; otherwise fails with
    /// [`SupchatError::NotConnected`]. The caller is responsible for falling
    /// back — the transport itself never does.
    pub async fn send(&self, payload: String) -> SupchatResult<()> {
        let sender = {
            let state = self.state.lock();
            if state.status != ConnectionStatus::Connected {
                return Err(SupchatError::NotConnected);
            }
            state.outbound.clone()
        };
        let Some(sender) = sender else {
            return Err(SupchatError::NotConnected);
        };
        sender
            .send(payload)
            .await
            .map_err(|_| SupchatError::NotConnected)
    }

    /// Tear down the connection. Safe to call from any state, including
    /// mid-handshake: the generation bump invalidates the in-flight
    /// connection task before it can commit `Connected`.
    ///
    /// Dropping the registered outbound sender winds the writer down, which
    /// sends a Close frame to the server. No `Closed` event is emitted for a
    /// connection that was deliberately discarded.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.status = ConnectionStatus::Disconnected;
        state.outbound = None;
    }
}

/// Runs one connection from handshake to teardown.
async fn run_connection(
    url: String,
    my_gen: u64,
    state: Arc<Mutex<ConnState>>,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    info!(url = %url, "Realtime transport: connecting");

    let (mut ws_stream, _) = match tokio_tungstenite::connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            warn!(error = %e, "Realtime transport unavailable");
            let mut state = state.lock();
            if state.generation == my_gen {
                state.status = ConnectionStatus::Failed;
            }
            return;
        }
    };

    let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
    let superseded = {
        let mut guard = state.lock();
        if guard.generation == my_gen {
            guard.outbound = Some(out_tx);
            guard.status = ConnectionStatus::Connected;
            false
        } else {
            true
        }
    };
    if superseded {
        // close() ran while the handshake was in flight.
        info!("Realtime transport: connection torn down during handshake");
        let _ = ws_stream.close(None).await;
        return;
    }
    info!("Realtime transport: connected");

    if event_tx.send(TransportEvent::Opened).await.is_err() {
        debug!("Transport subscriber gone before open completed");
        {
            let mut guard = state.lock();
            if guard.generation == my_gen {
                guard.outbound = None;
                guard.status = ConnectionStatus::Disconnected;
            }
        }
        let _ = ws_stream.close(None).await;
        return;
    }

    let (mut write, mut read) = ws_stream.split();

    // Writer half: forwards outbound payloads until the registered sender is
    // dropped (deliberate close), then tells the server.
    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = write.send(WsMessage::Text(text)).await {
                warn!(error = %e, "Realtime transport write error");
                break;
            }
        }
        let _ = write.send(WsMessage::Close(None)).await;
    });

    // Reader half: inbound frames in strict delivery order. A close frame or
    // read error is terminal; the error itself is only logged and the close
    // that follows is authoritative.
    while let Some(msg) = read.next().await {
        match msg {
            Ok(WsMessage::Text(text)) => {
                if event_tx.send(TransportEvent::Frame(text)).await.is_err() {
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => {
                info!("Realtime transport: server closed connection");
                break;
            }
            Ok(_) => {} // Ignore ping/pong/binary
            Err(e) => {
                warn!(error = %e, "Realtime transport read error");
                break;
            }
        }
    }

    // Only report the close if this connection is still the current one; a
    // deliberate `close()` (or a newer connection) has already moved on.
    let report_close = {
        let mut guard = state.lock();
        if guard.generation == my_gen {
            guard.outbound = None;
            guard.status = ConnectionStatus::Disconnected;
            true
        } else {
            false
        }
    };
    if report_close {
        let _ = event_tx.send(TransportEvent::Closed).await;
    }

    writer.abort();
}
