//! WebSocket endpoint: upgrade, lifecycle, read pump and write pump.
//!
//! The session id rides in the `sessionId` query parameter, with an
//! `Authorization: Bearer` header as fallback.  Both refusals (400 missing
//! identifier, 401 unknown/inactive session) happen before the upgrade.
//!
//! After the upgrade the socket splits: the write pump owns the sink and is
//! the only task that writes, the read pump owns the stream.  They meet in
//! the client's bounded outbound queue.

use crate::config::HubConfig;
use crate::hub::{ClientHandle, OutboundFrame};
use crate::presence::{PresenceError, SessionSnapshot};
use crate::router;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use plaza_protocol::{RawEnvelope, ServerMessage, UserLeft, Welcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let session_id = params
        .get("sessionId")
        .cloned()
        .or_else(|| bearer_session(&headers));
    let Some(session_id) = session_id else {
        return (StatusCode::BAD_REQUEST, "missing session identifier").into_response();
    };

    let snapshot = match state.presence.get_session(&session_id).await {
        Ok(snapshot) if snapshot.is_active => snapshot,
        Ok(_) => {
            return (StatusCode::UNAUTHORIZED, "session is not active").into_response();
        }
        Err(PresenceError::NotFound(_)) => {
            return (StatusCode::UNAUTHORIZED, "unknown session").into_response();
        }
        Err(e) => {
            warn!(error = %e, "presence lookup failed during upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, "presence unavailable").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, snapshot))
}

fn bearer_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(ToOwned::to_owned)
}

async fn handle_socket(socket: WebSocket, state: AppState, snapshot: SessionSnapshot) {
    let (sink, stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.outbound_queue_capacity);
    let client = ClientHandle::new(
        snapshot.session_id,
        snapshot.user_id,
        snapshot.map_id,
        outbound_tx,
    );

    tokio::spawn(write_pump(
        sink,
        outbound_rx,
        Arc::clone(&state.config),
        client.session_id.clone(),
    ));

    if state.hub.register(client.clone()).await.is_err() {
        return;
    }
    info!(
        session_id = %client.session_id,
        user_id = %client.user_id,
        map_id = %client.map_id,
        "session connected"
    );

    // Welcome, then the map snapshot, then the join announcement to peers.
    router::deliver(
        &state,
        &client,
        ServerMessage::Welcome(Welcome {
            session_id: client.session_id.clone(),
            user_id: client.user_id.clone(),
            map_id: client.map_id.clone(),
        }),
    );
    let users = router::map_roster(&state, &client.map_id, &client.session_id).await;
    router::deliver(
        &state,
        &client,
        ServerMessage::InitialUsers(plaza_protocol::InitialUsers { users }),
    );
    let joined =
        router::announce_user(&state, &client.session_id, &client.user_id, snapshot.avatar_pos)
            .await;
    state.hub.broadcast_to_map_except(
        &client.map_id,
        &client.session_id,
        ServerMessage::UserJoined(joined),
    );

    read_pump(&state, &client, stream).await;

    // Announce the departure unless a newer connection already took the
    // session over (then the user never left as far as peers can tell).
    // An evicted client is no longer registered but its peers still need
    // the announcement.
    let replaced = state.hub.is_connected(&client.session_id).await
        && !state.hub.is_current(&client.session_id, client.conn_seq()).await;
    if !replaced {
        state.hub.broadcast_to_map_except(
            &client.map_id,
            &client.session_id,
            ServerMessage::UserLeft(UserLeft {
                session_id: client.session_id.clone(),
                user_id: client.user_id.clone(),
            }),
        );
        state.hub.deregister(&client.session_id, client.conn_seq()).await;
    }
    info!(session_id = %client.session_id, "session disconnected");
    // Dropping `client` releases the last local queue sender; once the hub's
    // copy is gone too, the write pump drains and exits.
}

/// Inbound side: decode, stamp, validate, route.  Exits on close, transport
/// error, idle expiry or an undecodable frame.
async fn read_pump(state: &AppState, client: &ClientHandle, mut stream: SplitStream<WebSocket>) {
    loop {
        // Any frame — data or pong — refreshes the idle deadline.
        let frame = match timeout(state.config.read_idle_timeout, stream.next()).await {
            Err(_) => {
                info!(session_id = %client.session_id, "idle deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!(session_id = %client.session_id, error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<RawEnvelope>(&text) {
                Ok(raw) => router::route_message(state, client, &raw).await,
                Err(e) => {
                    warn!(
                        session_id = %client.session_id,
                        error = %e,
                        "undecodable frame, disconnecting"
                    );
                    break;
                }
            },
            Message::Ping(payload) => {
                // Reply through the queue so the write pump stays the only
                // writer.
                let _ = client.try_enqueue(OutboundFrame::Pong(payload.to_vec()));
            }
            Message::Pong(_) => {}
            Message::Close(_) => {
                debug!(session_id = %client.session_id, "client closed");
                break;
            }
            Message::Binary(_) => {
                warn!(session_id = %client.session_id, "binary frame on a text protocol, disconnecting");
                break;
            }
        }
    }
}

/// Outbound side: sole writer of the socket.  Serialises queued envelopes
/// under the write deadline and keeps the peer alive with periodic pings.
/// Exits when the queue closes or any write fails.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    config: Arc<HubConfig>,
    session_id: String,
) {
    let mut keepalive = tokio::time::interval(config.keepalive_interval);
    keepalive.tick().await;

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                let message = match frame {
                    OutboundFrame::Message(envelope) => match serde_json::to_string(&envelope) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            warn!(session_id = %session_id, error = %e, "dropping unserialisable envelope");
                            continue;
                        }
                    },
                    OutboundFrame::Pong(payload) => Message::Pong(payload.into()),
                    OutboundFrame::Shutdown => break,
                };
                match timeout(config.write_deadline, sink.send(message)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(session_id = %session_id, error = %e, "write failed");
                        break;
                    }
                    Err(_) => {
                        warn!(session_id = %session_id, "write deadline expired");
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                match timeout(config.write_deadline, sink.send(Message::Ping(Vec::<u8>::new().into()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }
    let _ = sink.close().await;
}
