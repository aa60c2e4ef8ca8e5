//! Client WebSocket endpoint
//!
//! `GET /?client_id=xxxx` upgrades to a socket. Each socket gets a writer
//! task fed by its registry [`Connection`], a ping task, a forwarding task
//! for client text, and a reader loop that runs until the client goes away
//! or stops answering pings.

use axum::Extension;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use relaydesk_core::{ClientId, Connection, Router};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

/// Server pings every 30 seconds so half-open sockets get noticed
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Close if the pong is not back within this long
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Ping cadence for client sockets
#[derive(Debug, Clone, Copy)]
pub struct Keepalive {
    pub interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            interval: PING_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    pub client_id: Option<String>,
}

impl ConnectQuery {
    pub fn client_id(&self) -> ClientId {
        match self.client_id.as_deref() {
            Some(id) if !id.is_empty() => ClientId::new(id),
            _ => ClientId::unknown(),
        }
    }
}

pub async fn ws_upgrade(
    State(router): State<Arc<Router>>,
    Extension(keepalive): Extension<Keepalive>,
    Query(params): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let client_id = params.client_id();
    debug!("WebSocket upgrade requested by {}", client_id);
    ws.on_upgrade(move |socket| run_connection(socket, router, client_id, keepalive))
}

/// Drive one client socket from handshake to close
pub async fn run_connection(
    socket: WebSocket,
    router: Arc<Router>,
    client_id: ClientId,
    keepalive: Keepalive,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (text_tx, text_rx) = mpsc::unbounded_channel::<String>();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();

    // Queued replies land in text_tx before anything live can
    let conn = router.connect(client_id.clone(), text_tx);

    let writer_handle = tokio::spawn(writer_task(ws_sender, text_rx, control_rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let mut ping_handle = tokio::spawn(ping_task(control_tx, pong_rx, keepalive));

    // Operator notifications can be slow; keep them off the reader so
    // pongs are still read while one is in flight
    let (forward_tx, forward_rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(forward_task(router.clone(), conn.clone(), forward_rx));

    loop {
        let frame = tokio::select! {
            frame = ws_receiver.next() => frame,
            _ = &mut ping_handle => {
                info!("Client {} stopped answering pings", client_id);
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let _ = forward_tx.send(text.as_str().to_string());
            }
            Some(Ok(Message::Binary(data))) => {
                debug!("Ignoring {} byte binary frame from {}", data.len(), client_id);
            }
            Some(Ok(Message::Pong(_))) => {
                let _ = pong_tx.send(());
            }
            // tungstenite answers pings on its own
            Some(Ok(Message::Ping(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                debug!("Client {} sent close: {:?}", client_id, frame);
                break;
            }
            Some(Err(e)) => {
                warn!("WebSocket receive error from {}: {}", client_id, e);
                break;
            }
            None => break,
        }
    }

    shutdown(&router, &conn, &[&writer_handle, &ping_handle]);
}

/// Deregister first so replies racing the close go to the mailbox, then
/// stop the socket tasks
fn shutdown(router: &Router, conn: &Connection, tasks: &[&JoinHandle<()>]) {
    router.disconnect(conn);
    for task in tasks {
        task.abort();
    }
    info!(
        "Socket for {} closed after {}s",
        conn.client_id(),
        conn.uptime().as_secs()
    );
}

/// Hand client text to the router one message at a time, in order
async fn forward_task(
    router: Arc<Router>,
    conn: Connection,
    mut forward_rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = forward_rx.recv().await {
        router.client_message(&conn, &text).await;
    }
}

/// Forward outbound frames to the socket until either side goes away
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut text_rx: mpsc::UnboundedReceiver<String>,
    mut control_rx: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            Some(control) = control_rx.recv() => control,
            Some(text) = text_rx.recv() => Message::Text(text.into()),
            else => break,
        };
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}

/// Returns once the peer misses a pong; the reader treats that as a close
async fn ping_task(
    control_tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    keepalive: Keepalive,
) {
    let mut ping_timer = interval(keepalive.interval);
    // First tick fires immediately
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        if control_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            break;
        }

        match timeout(keepalive.pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                warn!("Pong timeout, closing connection");
                let _ = control_tx.send(Message::Close(Some(CloseFrame {
                    code: 1001,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}
