//! Per-type dispatch of validated inbound envelopes.
//!
//! Every handler follows the same preamble: validate, rate-limit when the
//! message mutates or fans out, call the external side effect, ack the
//! sender, then broadcast to peers.  The ack is always enqueued on the
//! sender's queue before the fan-out is submitted.

use crate::hub::ClientHandle;
use crate::profile::{absolute_avatar_url, fallback_display_name};
use crate::rate_limit::{RateAction, RateLimitExceeded};
use crate::state::AppState;
use chrono::Utc;
use plaza_protocol::{
    AvatarMoveAck, AvatarMoveFrame, AvatarMoved, CallAccepted, CallAnswerFrame, CallCandidate,
    CallEndFrame, CallEnded, CallRejected, CallRequestFrame, CallRequested, CallSignal,
    CallerInfo, CandidateFrame, ClientMessage, ErrorMessage, InitialUsers, MapUser, PoiAck,
    PoiCallCandidate, PoiCallSignal, PoiCandidateFrame, PoiEvent, PoiFrame, PoiSignalFrame, Pong,
    Position, RawEnvelope, SignalFrame, ServerMessage, error_codes, parse_client_message,
};
use tracing::{debug, warn};

/// Decode, validate and dispatch one inbound frame.
pub async fn route_message(state: &AppState, client: &ClientHandle, raw: &RawEnvelope) {
    let message = match parse_client_message(raw) {
        Ok(message) => message,
        Err(violation) => {
            debug!(
                session_id = %client.session_id,
                kind = %raw.kind,
                error = %violation,
                "rejected invalid frame"
            );
            send_error(
                state,
                client,
                violation.to_string(),
                error_codes::PROTOCOL_ERROR,
                None,
            );
            return;
        }
    };

    match message {
        ClientMessage::Heartbeat => handle_heartbeat(state, client).await,
        ClientMessage::AvatarMove(frame) => handle_avatar_move(state, client, frame).await,
        ClientMessage::RequestInitialUsers => handle_initial_users(state, client).await,
        ClientMessage::PoiJoin(frame) => handle_poi_membership(state, client, frame, true).await,
        ClientMessage::PoiLeave(frame) => handle_poi_membership(state, client, frame, false).await,
        ClientMessage::CallRequest(frame) => handle_call_request(state, client, frame).await,
        ClientMessage::CallAccept(frame) => handle_call_answer(state, client, frame, true).await,
        ClientMessage::CallReject(frame) => handle_call_answer(state, client, frame, false).await,
        ClientMessage::CallEnd(frame) => handle_call_end(state, client, frame).await,
        ClientMessage::WebrtcOffer(frame) => {
            handle_webrtc_signal(state, client, frame, true).await;
        }
        ClientMessage::WebrtcAnswer(frame) => {
            handle_webrtc_signal(state, client, frame, false).await;
        }
        ClientMessage::IceCandidate(frame) => handle_ice_candidate(state, client, frame).await,
        ClientMessage::PoiCallOffer(frame) => {
            handle_poi_call_signal(state, client, frame, true).await;
        }
        ClientMessage::PoiCallAnswer(frame) => {
            handle_poi_call_signal(state, client, frame, false).await;
        }
        ClientMessage::PoiCallIceCandidate(frame) => {
            handle_poi_call_candidate(state, client, frame).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery helpers
// ---------------------------------------------------------------------------

/// Enqueue directly to one client.  A rejected enqueue means the client is
/// stalled or already terminating; either way it is evicted and the message
/// dropped.
pub(crate) fn deliver(state: &AppState, client: &ClientHandle, message: ServerMessage) {
    if let Err(reason) = client.enqueue_message(message) {
        warn!(
            session_id = %client.session_id,
            ?reason,
            "direct delivery failed, evicting client"
        );
        state.hub.evict(&client.session_id, client.conn_seq());
    }
}

fn send_error(
    state: &AppState,
    client: &ClientHandle,
    message: String,
    code: &str,
    retry_after: Option<u64>,
) {
    deliver(
        state,
        client,
        ServerMessage::Error(ErrorMessage {
            message,
            code: Some(code.to_owned()),
            retry_after,
        }),
    );
}

/// Consult the limiter.  On rejection the sender gets its `error` envelope
/// here and the handler bails out, suppressing the side effect and the
/// broadcast.
async fn rate_limited(state: &AppState, client: &ClientHandle, action: RateAction) -> bool {
    match state.limiter.check(&client.user_id, action).await {
        Ok(()) => false,
        Err(RateLimitExceeded { retry_after, .. }) => {
            debug!(
                user_id = %client.user_id,
                %action,
                "rate limit rejection"
            );
            send_error(
                state,
                client,
                format!("rate limit exceeded for {action}"),
                error_codes::RATE_LIMITED,
                Some(retry_after.as_secs().max(1)),
            );
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Presence-backed handlers
// ---------------------------------------------------------------------------

async fn handle_heartbeat(state: &AppState, client: &ClientHandle) {
    match state.presence.session_heartbeat(&client.session_id).await {
        Ok(()) => deliver(
            state,
            client,
            ServerMessage::Pong(Pong {
                timestamp: Utc::now(),
            }),
        ),
        Err(e) => {
            warn!(session_id = %client.session_id, error = %e, "heartbeat failed");
            send_error(
                state,
                client,
                format!("heartbeat failed: {e}"),
                error_codes::PRESENCE_UNAVAILABLE,
                None,
            );
        }
    }
}

async fn handle_avatar_move(state: &AppState, client: &ClientHandle, frame: AvatarMoveFrame) {
    if rate_limited(state, client, RateAction::UpdateAvatar).await {
        return;
    }

    if let Err(e) = state
        .presence
        .update_avatar_position(&client.session_id, frame.position)
        .await
    {
        warn!(session_id = %client.session_id, error = %e, "avatar position update failed");
        send_error(
            state,
            client,
            format!("failed to update avatar position: {e}"),
            error_codes::PRESENCE_UNAVAILABLE,
            None,
        );
        return;
    }

    deliver(
        state,
        client,
        ServerMessage::AvatarMoveAck(AvatarMoveAck {
            session_id: client.session_id.clone(),
            position: frame.position,
        }),
    );
    state.hub.broadcast_to_map_except(
        &client.map_id,
        &client.session_id,
        ServerMessage::AvatarMoved(AvatarMoved {
            session_id: client.session_id.clone(),
            user_id: client.user_id.clone(),
            position: frame.position,
        }),
    );
}

async fn handle_initial_users(state: &AppState, client: &ClientHandle) {
    let users = map_roster(state, &client.map_id, &client.session_id).await;
    deliver(state, client, ServerMessage::InitialUsers(InitialUsers { users }));
}

/// Everyone currently on `map_id` except `except_session`, with presence and
/// profile folded in.  Inactive sessions and sessions presence no longer
/// knows are skipped.
pub(crate) async fn map_roster(
    state: &AppState,
    map_id: &str,
    except_session: &str,
) -> Vec<MapUser> {
    let mut users = Vec::new();
    for member in state.hub.sessions_in_map(map_id).await {
        if member.session_id == except_session {
            continue;
        }
        let snapshot = match state.presence.get_session(&member.session_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(session_id = %member.session_id, error = %e, "roster lookup skipped session");
                continue;
            }
        };
        if !snapshot.is_active {
            continue;
        }
        users.push(
            announce_user(state, &member.session_id, &member.user_id, snapshot.avatar_pos).await,
        );
    }
    users
}

/// Compose the announcement record for one user, applying the display-name
/// fallback and avatar URL absolutisation.
pub(crate) async fn announce_user(
    state: &AppState,
    session_id: &str,
    user_id: &str,
    position: Position,
) -> MapUser {
    let (display_name, avatar_url, about_me) = match state.profiles.get_profile(user_id).await {
        Some(profile) => (
            profile.display_name,
            profile
                .avatar_url
                .map(|url| absolute_avatar_url(&state.config.avatar_base_url, &url)),
            profile.about_me,
        ),
        None => (fallback_display_name(user_id), None, None),
    };
    MapUser {
        session_id: session_id.to_owned(),
        user_id: user_id.to_owned(),
        display_name,
        avatar_url,
        about_me,
        position,
        role: "user".to_owned(),
    }
}

// ---------------------------------------------------------------------------
// POI membership (optimistic path)
// ---------------------------------------------------------------------------

/// `poi_join` / `poi_leave`.
///
/// Authoritative membership is mutated by the HTTP side; this path only
/// acks the sender and notifies peers optimistically.  The canonical state
/// (count + participant list) reaches everyone again via the event bridge.
async fn handle_poi_membership(
    state: &AppState,
    client: &ClientHandle,
    frame: PoiFrame,
    joining: bool,
) {
    let action = if joining {
        RateAction::JoinPoi
    } else {
        RateAction::LeavePoi
    };
    if rate_limited(state, client, action).await {
        return;
    }

    let ack = PoiAck {
        session_id: client.session_id.clone(),
        poi_id: frame.poi_id.clone(),
        success: true,
    };
    let event = PoiEvent {
        poi_id: frame.poi_id,
        user_id: client.user_id.clone(),
        session_id: Some(client.session_id.clone()),
        map_id: None,
        current_count: None,
        participants: None,
    };
    if joining {
        deliver(state, client, ServerMessage::PoiJoinAck(ack));
        state.hub.broadcast_to_map_except(
            &client.map_id,
            &client.session_id,
            ServerMessage::PoiJoined(event),
        );
    } else {
        deliver(state, client, ServerMessage::PoiLeaveAck(ack));
        state.hub.broadcast_to_map_except(
            &client.map_id,
            &client.session_id,
            ServerMessage::PoiLeft(event),
        );
    }
}

// ---------------------------------------------------------------------------
// 1:1 call control
// ---------------------------------------------------------------------------

/// Forward a frame to one user's session.  Missing targets are logged and
/// dropped; the catalogue has no delivery-failure kind.
async fn forward_to_user(
    state: &AppState,
    client: &ClientHandle,
    target_user_id: &str,
    message: ServerMessage,
) {
    let kind = message.kind();
    let delivered = state
        .hub
        .broadcast_to_user(target_user_id, Some(&client.session_id), message)
        .await;
    if !delivered {
        warn!(
            from = %client.user_id,
            target = %target_user_id,
            kind,
            "dropping signal for user with no live session"
        );
    }
}

async fn handle_call_request(state: &AppState, client: &ClientHandle, frame: CallRequestFrame) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    let display_name = match frame.caller_name {
        Some(name) => Some(name),
        None => state
            .profiles
            .get_profile(&client.user_id)
            .await
            .map(|profile| profile.display_name),
    };
    // Forwarded to the callee only; the caller gets no echo.
    forward_to_user(
        state,
        client,
        &frame.target_user_id,
        ServerMessage::CallRequest(CallRequested {
            call_id: frame.call_id,
            caller_info: CallerInfo {
                user_id: client.user_id.clone(),
                session_id: client.session_id.clone(),
                display_name,
            },
        }),
    )
    .await;
}

/// Publish the derived in-call flag for both call participants to the
/// sender's map.
fn broadcast_call_status(state: &AppState, client: &ClientHandle, peer_user_id: &str, in_call: bool) {
    for user_id in [peer_user_id, client.user_id.as_str()] {
        state.hub.broadcast_to_map(
            &client.map_id,
            ServerMessage::UserCallStatus(plaza_protocol::UserCallStatus {
                user_id: user_id.to_owned(),
                is_in_call: in_call,
            }),
        );
    }
}

async fn handle_call_answer(
    state: &AppState,
    client: &ClientHandle,
    frame: CallAnswerFrame,
    accepted: bool,
) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    let message = if accepted {
        ServerMessage::CallAccept(CallAccepted {
            call_id: frame.call_id,
            accepter: client.user_id.clone(),
        })
    } else {
        ServerMessage::CallReject(CallRejected {
            call_id: frame.call_id,
            rejecter: client.user_id.clone(),
        })
    };
    forward_to_user(state, client, &frame.caller_user_id, message).await;
    broadcast_call_status(state, client, &frame.caller_user_id, accepted);
}

async fn handle_call_end(state: &AppState, client: &ClientHandle, frame: CallEndFrame) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    forward_to_user(
        state,
        client,
        &frame.other_user_id,
        ServerMessage::CallEnd(CallEnded {
            call_id: frame.call_id,
            ender: client.user_id.clone(),
        }),
    )
    .await;
    broadcast_call_status(state, client, &frame.other_user_id, false);
}

// ---------------------------------------------------------------------------
// WebRTC signalling (1:1 and POI-scoped)
// ---------------------------------------------------------------------------

async fn handle_webrtc_signal(
    state: &AppState,
    client: &ClientHandle,
    frame: SignalFrame,
    offer: bool,
) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    let signal = CallSignal {
        call_id: frame.call_id,
        from_user_id: client.user_id.clone(),
        sdp: frame.sdp,
    };
    let message = if offer {
        ServerMessage::WebrtcOffer(signal)
    } else {
        ServerMessage::WebrtcAnswer(signal)
    };
    forward_to_user(state, client, &frame.target_user_id, message).await;
}

async fn handle_ice_candidate(state: &AppState, client: &ClientHandle, frame: CandidateFrame) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    forward_to_user(
        state,
        client,
        &frame.target_user_id,
        ServerMessage::IceCandidate(CallCandidate {
            call_id: frame.call_id,
            from_user_id: client.user_id.clone(),
            candidate: frame.candidate,
        }),
    )
    .await;
}

async fn handle_poi_call_signal(
    state: &AppState,
    client: &ClientHandle,
    frame: PoiSignalFrame,
    offer: bool,
) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    let signal = PoiCallSignal {
        poi_id: frame.poi_id,
        from_user_id: client.user_id.clone(),
        sdp: frame.sdp,
    };
    let message = if offer {
        ServerMessage::PoiCallOffer(signal)
    } else {
        ServerMessage::PoiCallAnswer(signal)
    };
    forward_to_user(state, client, &frame.target_user_id, message).await;
}

async fn handle_poi_call_candidate(
    state: &AppState,
    client: &ClientHandle,
    frame: PoiCandidateFrame,
) {
    if rate_limited(state, client, RateAction::CallSignal).await {
        return;
    }

    forward_to_user(
        state,
        client,
        &frame.target_user_id,
        ServerMessage::PoiCallIceCandidate(PoiCallCandidate {
            poi_id: frame.poi_id,
            from_user_id: client.user_id.clone(),
            candidate: frame.candidate,
        }),
    )
    .await;
}
