use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::HubHandle;
use super::hub::Hub;
use super::messages::{ClientMessage, SignalKind};
use super::types::{ConnectionId, OutboundMessage, SignalingError};
use crate::config::{OriginPolicy, ServerConfig};

const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);
// tokio::time::interval panics on a zero period
const MIN_PING_INTERVAL: Duration = Duration::from_millis(100);
/// Pause after a failed accept (fd exhaustion, aborted handshake) before retrying.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Per-connection transport settings shared by every connection task.
#[derive(Debug, Clone)]
struct ConnectionSettings {
    origins: OriginPolicy,
    ping_interval: Duration,
    pong_timeout: Duration,
}

impl ConnectionSettings {
    fn from_config(config: &ServerConfig) -> Self {
        Self {
            origins: config.allowed_origins.clone(),
            ping_interval: config.ping_interval.max(MIN_PING_INTERVAL),
            pong_timeout: config.pong_timeout,
        }
    }
}

/// Source of inbound TCP connections for the accept loop.
trait Acceptor {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    fn accept(&self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }
}

pub struct SignalingServer {
    listener: TcpListener,
    handle: HubHandle,
    settings: ConnectionSettings,
}

impl SignalingServer {
    /// Bind the listener and start a fresh hub for it.
    pub async fn bind(config: &ServerConfig) -> Result<Self, SignalingError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let handle = HubHandle::spawn(Hub::new(config.chat_policy));

        info!("Signaling server listening on {}", listener.local_addr()?);
        info!("Allowed origins: {:?}", config.allowed_origins.origins());

        Ok(Self {
            listener,
            handle,
            settings: ConnectionSettings::from_config(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SignalingError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the hub behind this server
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }

    /// Accept connections until the task is dropped.
    ///
    /// A failed accept never ends the loop; it is logged and retried after a
    /// short pause so live connections are unaffected.
    pub async fn run(self) {
        accept_loop(&self.listener, &self.handle, &self.settings).await
    }
}

async fn accept_loop<A: Acceptor + Sync>(
    acceptor: &A,
    handle: &HubHandle,
    settings: &ConnectionSettings,
) {
    loop {
        let (stream, addr) = match acceptor.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", SignalingError::Io(e));
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let handle = handle.clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, handle, settings).await {
                error!("Connection error from {}: {}", addr, e);
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: HubHandle,
    settings: ConnectionSettings,
) -> Result<(), SignalingError> {
    let origins = settings.origins.clone();
    let check_origin = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        let origin = req
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        if origins.allows(origin) {
            Ok(resp)
        } else {
            warn!("Rejected upgrade from {} with origin {:?}", addr, origin);
            let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
            *refusal.status_mut() = StatusCode::FORBIDDEN;
            Err(refusal)
        }
    };

    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_origin).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    let conn = handle.connect(tx).await?;
    info!("WebSocket connection from {} as {}", addr, conn);

    let mut ping_interval = tokio::time::interval(settings.ping_interval);
    ping_interval.tick().await;
    let mut waiting_for_pong = false;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if waiting_for_pong {
                    warn!("No Pong received, disconnecting {}", conn);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(tokio::time::Instant::now() + settings.pong_timeout);
                debug!("Ping sent to {}", conn);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", conn);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", conn, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if let Err(e) = handle_text_message(&text, conn, &handle).await {
                            warn!("Message handling error for {}: {}", conn, e);
                            break;
                        }
                    }
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", conn);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", conn);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // Dropping the hub's outbox sender (on disconnect) ends the writer.
    let disconnected = handle.disconnect(conn).await;
    drop(ctrl_tx);
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        debug!("Writer for {} did not finish in time", conn);
        send_task.abort();
    }
    info!("WebSocket disconnected: {} ({})", conn, addr);

    disconnected
}

/// Parse one client frame and forward it to the hub.
///
/// Malformed frames are logged and skipped; only a dead hub is an error.
async fn handle_text_message(
    text: &str,
    conn: ConnectionId,
    handle: &HubHandle,
) -> Result<(), SignalingError> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Dropping malformed message from {}: {}", conn, e);
            return Ok(());
        }
    };

    match client_msg {
        ClientMessage::JoinRoom { room_id } => handle.join_room(conn, room_id).await,

        ClientMessage::LeaveRoom { room_id } => handle.leave_room(conn, room_id).await,

        ClientMessage::Offer { offer, to, .. } => {
            handle.relay(SignalKind::Offer, conn, to, offer).await
        }

        ClientMessage::Answer { answer, to, .. } => {
            handle.relay(SignalKind::Answer, conn, to, answer).await
        }

        ClientMessage::IceCandidate { candidate, to, .. } => {
            handle
                .relay(SignalKind::IceCandidate, conn, to, candidate)
                .await
        }

        ClientMessage::ChatMessage {
            username,
            message,
            room_id,
        } => handle.chat(conn, room_id, username, message).await,
    }
}
