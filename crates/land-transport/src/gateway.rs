// SPDX-License-Identifier: Apache-2.0
//! The `axum` WebSocket host: accepts connections, frames them through
//! [`Session`], and forwards per-Land fan-out traffic back out. Each
//! connection splits into a writer task, a ping loop, and task-racing
//! shutdown over LandKeeper's join/action/event protocol.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use land_realm::Realm;
use land_state::{ClientId, SessionId};
use land_wire::{
    Encoding, ErrorCode, ErrorPayload, JsonCodec, MsgPackCodec, OpcodeJsonCodec, TransportMessage,
    WireError,
};
use tokio::sync::mpsc;
use tokio::time;

use crate::fanout::{FanoutRegistry, OutboundItem};
use crate::session::{Session, TransportConfig};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const WRITER_CHANNEL_CAPACITY: usize = 256;

type TaskResult<T> = std::result::Result<T, tokio::task::JoinError>;

/// Everything the gateway's handlers need, shared across every connection.
#[derive(Clone)]
pub struct GatewayState {
    realm: Realm,
    fanouts: FanoutRegistry,
    transport_config: TransportConfig,
    next_session_id: Arc<AtomicU64>,
}

impl GatewayState {
    /// Build gateway state over an already-populated [`Realm`].
    #[must_use]
    pub fn new(realm: Realm, transport_config: TransportConfig) -> Self {
        Self {
            realm,
            fanouts: FanoutRegistry::new(),
            transport_config,
            next_session_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn allocate_session_id(&self) -> SessionId {
        SessionId::from_raw(self.next_session_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// The `/ws` route, ready to be merged into a larger `axum::Router`.
#[must_use]
pub fn router(state: GatewayState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(
    State(state): State<GatewayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, peer))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, peer: SocketAddr) {
    let session_id = state.allocate_session_id();
    let client_id = ClientId::new(format!("ws-{peer}"));
    let mut session = Session::new(session_id, client_id);

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(WRITER_CHANNEL_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let ping_tx = out_tx.clone();
    let ping = tokio::spawn(async move {
        let mut interval = time::interval(KEEPALIVE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            if ping_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                break;
            }
        }
    });

    let mut joined = false;
    let mut fanout_forward: Option<tokio::task::JoinHandle<()>> = None;
    let deadline = time::sleep(JOIN_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            biased;
            () = &mut deadline, if !joined => {
                tracing::warn!(%peer, "join timeout elapsed, closing connection");
                break;
            }
            incoming = ws_rx.next() => {
                let Some(incoming) = incoming else { break };
                let msg = match incoming {
                    Ok(msg) => msg,
                    Err(err) => {
                        tracing::warn!(%peer, %err, "websocket recv error");
                        break;
                    }
                };
                match &msg {
                    Message::Ping(payload) => {
                        if out_tx.send(Message::Pong(payload.clone())).await.is_err() {
                            break;
                        }
                        continue;
                    }
                    Message::Pong(_) => continue,
                    Message::Close(_) => break,
                    Message::Text(_) | Message::Binary(_) => {}
                }

                let decoded = match decode_inbound(msg, session.encoding()) {
                    Ok(decoded) => decoded,
                    Err(err) => {
                        tracing::warn!(%peer, %err, "failed to decode inbound frame");
                        let _ = send_encoded(
                            &out_tx,
                            &TransportMessage::Error(ErrorPayload {
                                code: ErrorCode::InvalidFrame,
                                message: err.to_string(),
                                details: None,
                                request_id: None,
                            }),
                            Encoding::Json,
                        )
                        .await;
                        break;
                    }
                };

                let outcome = session
                    .handle(decoded, &state.realm, &state.fanouts, &state.transport_config)
                    .await;
                for reply in &outcome.replies {
                    if !send_encoded(&out_tx, reply, session.encoding()).await {
                        break;
                    }
                }
                if let Some(outbox) = outcome.subscribe {
                    joined = true;
                    fanout_forward = Some(tokio::spawn(forward_fanout(
                        outbox,
                        out_tx.clone(),
                        session.encoding(),
                    )));
                }
                if outcome.close {
                    break;
                }
            }
        }
    }

    session.leave().await;
    ping.abort();
    if let Some(handle) = fanout_forward {
        handle.abort();
        log_void_task_result("fanout_forward", peer, handle.await);
    }
    drop(out_tx);
    match time::timeout(Duration::from_secs(1), writer).await {
        Ok(res) => log_void_task_result("writer", peer, res),
        Err(_) => tracing::debug!(%peer, "writer did not drain within the grace period"),
    }
    log_void_task_result("ping", peer, ping.await);
}

fn decode_inbound(msg: Message, encoding: Encoding) -> Result<TransportMessage, WireError> {
    match msg {
        Message::Text(text) => match encoding {
            Encoding::OpcodeJson => OpcodeJsonCodec.decode(&text),
            Encoding::Json | Encoding::MessagePack => JsonCodec.decode(&text),
        },
        Message::Binary(bytes) => match encoding {
            Encoding::MessagePack => MsgPackCodec.decode(&bytes),
            Encoding::OpcodeJson => std::str::from_utf8(&bytes)
                .map_err(|err| WireError::MalformedFrame(err.to_string()))
                .and_then(|text| OpcodeJsonCodec.decode(text)),
            Encoding::Json => JsonCodec.decode_bytes(&bytes),
        },
        _ => Err(WireError::MalformedFrame("unexpected control frame".into())),
    }
}

fn encode_outbound(msg: &TransportMessage, encoding: Encoding) -> Result<Message, WireError> {
    Ok(match encoding {
        Encoding::Json => Message::Text(JsonCodec.encode(msg)?.into()),
        Encoding::OpcodeJson => Message::Text(OpcodeJsonCodec.encode(msg)?.into()),
        Encoding::MessagePack => Message::Binary(MsgPackCodec.encode(msg)?.into()),
    })
}

async fn send_encoded(out_tx: &mpsc::Sender<Message>, msg: &TransportMessage, encoding: Encoding) -> bool {
    match encode_outbound(msg, encoding) {
        Ok(wire) => out_tx.send(wire).await.is_ok(),
        Err(err) => {
            tracing::warn!(%err, "failed to encode outbound frame");
            true
        }
    }
}

async fn forward_fanout(
    mut outbox: crate::fanout::SessionOutbox,
    out_tx: mpsc::Sender<Message>,
    encoding: Encoding,
) {
    loop {
        tokio::select! {
            biased;
            _ = outbox.close.recv() => break,
            item = outbox.items.recv() => {
                match item {
                    None => break,
                    Some(OutboundItem::Frame(msg)) => {
                        if !send_encoded(&out_tx, &msg, encoding).await {
                            break;
                        }
                    }
                    Some(OutboundItem::MergedMsgPack(bytes)) => {
                        if out_tx.send(Message::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
}

fn log_void_task_result(name: &'static str, peer: SocketAddr, res: TaskResult<()>) {
    match res {
        Ok(()) => {}
        Err(err) if err.is_cancelled() => {}
        Err(err) => tracing::error!(%peer, %err, "{name} task panicked"),
    }
}
