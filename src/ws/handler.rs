//! WebSocket session handling: admission, join, and input forwarding
//!
//! This layer is the trust boundary. Connections pass the per-origin
//! quota before anything else, every inbound frame is counted against
//! the message-rate ceiling, and payloads that fail to parse are
//! dropped without ever reaching the simulation.

use axum::{
    extract::{
        connect_info::ConnectInfo,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::net::{IpAddr, SocketAddr};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Outbound, Recipient, RoomInbound};
use crate::util::rate_limit::MessageBudget;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let origin = client_origin(&headers, peer);
    ws.on_upgrade(move |socket| handle_socket(socket, origin, state))
}

/// Resolve the client origin address, honoring a single forwarded-for hop
fn client_origin(headers: &HeaderMap, peer: SocketAddr) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .unwrap_or_else(|| peer.ip())
}

/// A joined connection: the room's input channel plus the writer task
/// draining the room's broadcasts back to this socket.
struct Session {
    input_tx: mpsc::Sender<RoomInbound>,
    writer: tokio::task::JoinHandle<()>,
}

async fn handle_socket(socket: WebSocket, origin: IpAddr, state: AppState) {
    let conn_id = Uuid::new_v4();
    let (sink, mut stream) = socket.split();
    let mut sink = Some(sink);

    // Admission: the slot is held for the connection's lifetime and
    // released when this function returns.
    let Some(_slot) = state.connections.acquire(origin) else {
        warn!(conn_id = %conn_id, origin = %origin, "Origin over connection quota, rejecting");
        if let Some(mut sink) = sink.take() {
            let reject = ServerMsg::Error {
                code: "too_many_connections".to_string(),
                message: "Too many connections from this address".to_string(),
            };
            let _ = send_msg(&mut sink, &reject).await;
        }
        return;
    };

    info!(conn_id = %conn_id, origin = %origin, "New WebSocket connection");

    let budget = MessageBudget::new(state.config.max_messages_per_second);
    let mut session: Option<Session> = None;

    while let Some(result) = stream.next().await {
        let msg = match result {
            Ok(msg) => msg,
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                if !budget.allow() {
                    warn!(conn_id = %conn_id, "Message rate ceiling exceeded, disconnecting");
                    break;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(conn_id = %conn_id, error = %e, "Dropping malformed message");
                        continue;
                    }
                };

                match client_msg {
                    ClientMsg::Join { name, room } => {
                        if session.is_some() {
                            warn!(conn_id = %conn_id, "Duplicate join ignored");
                            continue;
                        }
                        let (input_tx, outbound_rx) =
                            state.rooms.join(conn_id, &name, &room).await;
                        let Some(sink) = sink.take() else { break };
                        let writer = tokio::spawn(write_outbound(conn_id, sink, outbound_rx));
                        session = Some(Session { input_tx, writer });
                    }
                    other => {
                        // Gameplay messages before a join are dropped
                        if let Some(session) = &session {
                            let forwarded = session
                                .input_tx
                                .send(RoomInbound::Msg {
                                    conn_id,
                                    msg: other,
                                })
                                .await;
                            if forwarded.is_err() {
                                debug!(conn_id = %conn_id, "Room channel closed");
                                break;
                            }
                        }
                    }
                }
            }
            Message::Binary(_) => {
                warn!(conn_id = %conn_id, "Binary message ignored");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => {
                debug!(conn_id = %conn_id, "Client initiated close");
                break;
            }
        }
    }

    // Synchronous removal: the room sees the leave before its next tick
    if let Some(session) = session {
        let _ = session.input_tx.send(RoomInbound::Leave { conn_id }).await;
        session.writer.abort();
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Forward room broadcasts to one socket, filtering private envelopes
async fn write_outbound(
    conn_id: Uuid,
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: broadcast::Receiver<Outbound>,
) {
    loop {
        match outbound_rx.recv().await {
            Ok(envelope) => {
                let deliver = match envelope.to {
                    Recipient::Room => true,
                    Recipient::One(id) => id == conn_id,
                };
                if !deliver {
                    continue;
                }
                if send_msg(&mut sink, &envelope.msg).await.is_err() {
                    debug!(conn_id = %conn_id, "WebSocket send failed");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                // Don't disconnect for lag; the next full snapshot catches up
                warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} messages", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "10.1.2.3, 192.168.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_origin(&headers, peer), "10.1.2.3".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn garbage_forwarded_for_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_origin(&headers, peer), peer.ip());
    }

    #[test]
    fn missing_forwarded_for_uses_peer() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "203.0.113.7:1234".parse().unwrap();
        assert_eq!(client_origin(&headers, peer), peer.ip());
    }
}
