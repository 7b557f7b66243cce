// plaza-protocol: shared-map hub wire types and validation.
//
// Every WebSocket frame is a text envelope `{type, data, timestamp}`.  The
// `type` tag discriminates the payload; `timestamp` is always assigned by the
// server (on receipt for inbound frames, at construction for outbound ones).
// Client-supplied timestamps are ignored.
//
// Inbound decoding is two-stage: `RawEnvelope` accepts any well-formed frame
// (a frame that fails even this stage is undecodable and the connection is
// dropped), then `parse_client_message` enforces the per-type contract and
// returns a `ProtocolViolation` that the hub answers with an `error`
// envelope, leaving the connection up.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The framed unit of the protocol.
///
/// Serializes as `{"type": ..., "data": ..., "timestamp": ...}` when `T` is a
/// tagged message enum such as [`ServerMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub message: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> Envelope<T> {
    /// Wrap `message` with a server-assigned timestamp.
    pub fn new(message: T) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
        }
    }
}

/// First-stage decode of an inbound frame.
///
/// Only the tag is required here; `data` defaults to JSON `null` so that
/// frames for payload-less kinds (`heartbeat`, `request_initial_users`) may
/// omit it entirely.  Anything that fails to parse into this shape is
/// undecodable and grounds for disconnect.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// A point on the shared map.  Validated at ingress: `lat ∈ [-90, 90]`,
/// `lng ∈ [-180, 180]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

/// One user visible on a map, as carried by `initial_users` and
/// `user_joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapUser {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(rename = "aboutMe", skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    pub position: Position,
    pub role: String,
}

/// One member of a POI participant list (canonical bridge payloads only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiParticipant {
    pub id: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "avatarURL", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Identity of the caller, attached to a forwarded `call_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerInfo {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Server -> Client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "mapID")]
    pub map_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialUsers {
    pub users: Vec<MapUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLeft {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// Reply to a client `heartbeat`.  The envelope already carries the send
/// timestamp; it is repeated in the payload per the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarMoveAck {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarMoved {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    pub position: Position,
}

/// Ack to the sender of `poi_join` / `poi_leave`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiAck {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    #[serde(rename = "poiID")]
    pub poi_id: String,
    pub success: bool,
}

/// `poi_joined` / `poi_left` fan-out.
///
/// Two producers share this shape: the router's optimistic broadcast carries
/// `sessionID` only, while the canonical bridge broadcast carries `mapID`,
/// `currentCount` and the full participant list.  The canonical payload is a
/// field-superset so a client may idempotently overwrite the optimistic one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiEvent {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "mapID", skip_serializing_if = "Option::is_none")]
    pub map_id: Option<String>,
    #[serde(rename = "currentCount", skip_serializing_if = "Option::is_none")]
    pub current_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<PoiParticipant>>,
}

/// `poi_created` / `poi_updated` fan-out (bridge-originated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiSummary {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "mapID")]
    pub map_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: Position,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    #[serde(rename = "maxParticipants")]
    pub max_participants: u32,
    #[serde(rename = "currentCount")]
    pub current_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiDeleted {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "mapID")]
    pub map_id: String,
}

/// `call_request` as forwarded to the callee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequested {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "callerInfo")]
    pub caller_info: CallerInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAccepted {
    #[serde(rename = "callID")]
    pub call_id: String,
    pub accepter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRejected {
    #[serde(rename = "callID")]
    pub call_id: String,
    pub rejecter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnded {
    #[serde(rename = "callID")]
    pub call_id: String,
    pub ender: String,
}

/// Derived in-call presence flag, broadcast to the map of each participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCallStatus {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "isInCall")]
    pub is_in_call: bool,
}

/// `webrtc_offer` / `webrtc_answer` as forwarded to the target user.  The
/// hub never inspects the SDP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSignal {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "fromUserID")]
    pub from_user_id: String,
    pub sdp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallCandidate {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "fromUserID")]
    pub from_user_id: String,
    pub candidate: Value,
}

/// POI group-call variant of [`CallSignal`], scoped by `poiID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiCallSignal {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "fromUserID")]
    pub from_user_id: String,
    pub sdp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiCallCandidate {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "fromUserID")]
    pub from_user_id: String,
    pub candidate: Value,
}

/// Recoverable-problem report.  The connection stays up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Seconds until the client should retry a rate-limited action.
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Frozen error code strings carried in `error` envelopes.
pub mod error_codes {
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const PRESENCE_UNAVAILABLE: &str = "PRESENCE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

// ---------------------------------------------------------------------------
// Server -> Client discriminated union
// ---------------------------------------------------------------------------

/// All server-originated message kinds.
///
/// Serializes with the `type` tag beside a `data` object:
///
/// ```json
/// { "type": "avatar_moved", "data": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome(Welcome),
    InitialUsers(InitialUsers),
    UserJoined(MapUser),
    UserLeft(UserLeft),
    Pong(Pong),
    AvatarMoveAck(AvatarMoveAck),
    AvatarMoved(AvatarMoved),
    PoiJoinAck(PoiAck),
    PoiLeaveAck(PoiAck),
    PoiJoined(PoiEvent),
    PoiLeft(PoiEvent),
    PoiCreated(PoiSummary),
    PoiUpdated(PoiSummary),
    PoiDeleted(PoiDeleted),
    CallRequest(CallRequested),
    CallAccept(CallAccepted),
    CallReject(CallRejected),
    CallEnd(CallEnded),
    UserCallStatus(UserCallStatus),
    WebrtcOffer(CallSignal),
    WebrtcAnswer(CallSignal),
    IceCandidate(CallCandidate),
    PoiCallOffer(PoiCallSignal),
    PoiCallAnswer(PoiCallSignal),
    PoiCallIceCandidate(PoiCallCandidate),
    Error(ErrorMessage),
}

impl ServerMessage {
    /// The wire tag, for structured logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Welcome(_) => "welcome",
            ServerMessage::InitialUsers(_) => "initial_users",
            ServerMessage::UserJoined(_) => "user_joined",
            ServerMessage::UserLeft(_) => "user_left",
            ServerMessage::Pong(_) => "pong",
            ServerMessage::AvatarMoveAck(_) => "avatar_move_ack",
            ServerMessage::AvatarMoved(_) => "avatar_moved",
            ServerMessage::PoiJoinAck(_) => "poi_join_ack",
            ServerMessage::PoiLeaveAck(_) => "poi_leave_ack",
            ServerMessage::PoiJoined(_) => "poi_joined",
            ServerMessage::PoiLeft(_) => "poi_left",
            ServerMessage::PoiCreated(_) => "poi_created",
            ServerMessage::PoiUpdated(_) => "poi_updated",
            ServerMessage::PoiDeleted(_) => "poi_deleted",
            ServerMessage::CallRequest(_) => "call_request",
            ServerMessage::CallAccept(_) => "call_accept",
            ServerMessage::CallReject(_) => "call_reject",
            ServerMessage::CallEnd(_) => "call_end",
            ServerMessage::UserCallStatus(_) => "user_call_status",
            ServerMessage::WebrtcOffer(_) => "webrtc_offer",
            ServerMessage::WebrtcAnswer(_) => "webrtc_answer",
            ServerMessage::IceCandidate(_) => "ice_candidate",
            ServerMessage::PoiCallOffer(_) => "poi_call_offer",
            ServerMessage::PoiCallAnswer(_) => "poi_call_answer",
            ServerMessage::PoiCallIceCandidate(_) => "poi_call_ice_candidate",
            ServerMessage::Error(_) => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarMoveFrame {
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiFrame {
    #[serde(rename = "poiID")]
    pub poi_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequestFrame {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "targetUserID")]
    pub target_user_id: String,
    /// Display name the caller wants shown; the hub falls back to the
    /// profile service when absent.
    #[serde(rename = "callerName", default, skip_serializing_if = "Option::is_none")]
    pub caller_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallAnswerFrame {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "callerUserID")]
    pub caller_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEndFrame {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "otherUserID")]
    pub other_user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalFrame {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "targetUserID")]
    pub target_user_id: String,
    pub sdp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFrame {
    #[serde(rename = "callID")]
    pub call_id: String,
    #[serde(rename = "targetUserID")]
    pub target_user_id: String,
    pub candidate: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiSignalFrame {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "targetUserID")]
    pub target_user_id: String,
    pub sdp: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiCandidateFrame {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "targetUserID")]
    pub target_user_id: String,
    pub candidate: Value,
}

/// A validated inbound message, ready for routing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Heartbeat,
    AvatarMove(AvatarMoveFrame),
    RequestInitialUsers,
    PoiJoin(PoiFrame),
    PoiLeave(PoiFrame),
    CallRequest(CallRequestFrame),
    CallAccept(CallAnswerFrame),
    CallReject(CallAnswerFrame),
    CallEnd(CallEndFrame),
    WebrtcOffer(SignalFrame),
    WebrtcAnswer(SignalFrame),
    IceCandidate(CandidateFrame),
    PoiCallOffer(PoiSignalFrame),
    PoiCallAnswer(PoiSignalFrame),
    PoiCallIceCandidate(PoiCandidateFrame),
}

// ---------------------------------------------------------------------------
// Inbound validation
// ---------------------------------------------------------------------------

/// A frame that decoded but does not satisfy the per-type contract.
///
/// Answered with an `error` envelope; never grounds for disconnect.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolViolation {
    #[error("unknown message type: {kind}")]
    UnknownType { kind: String },
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("latitude {lat} out of range [-90, 90]")]
    LatitudeOutOfRange { lat: f64 },
    #[error("longitude {lng} out of range [-180, 180]")]
    LongitudeOutOfRange { lng: f64 },
}

/// Range-check a client-supplied position.
pub fn validate_position(position: Position) -> Result<(), ProtocolViolation> {
    if !position.lat.is_finite() || position.lat < -90.0 || position.lat > 90.0 {
        return Err(ProtocolViolation::LatitudeOutOfRange { lat: position.lat });
    }
    if !position.lng.is_finite() || position.lng < -180.0 || position.lng > 180.0 {
        return Err(ProtocolViolation::LongitudeOutOfRange { lng: position.lng });
    }
    Ok(())
}

fn payload<T: DeserializeOwned>(kind: &str, data: &Value) -> Result<T, ProtocolViolation> {
    serde_json::from_value(data.clone()).map_err(|e| ProtocolViolation::InvalidPayload {
        kind: kind.to_owned(),
        reason: e.to_string(),
    })
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ProtocolViolation> {
    if value.is_empty() {
        return Err(ProtocolViolation::EmptyField { field });
    }
    Ok(())
}

/// Enforce the per-type contract on a decoded frame.
///
/// Server-originated tags arriving inbound are treated the same as tags the
/// protocol has never heard of.
pub fn parse_client_message(raw: &RawEnvelope) -> Result<ClientMessage, ProtocolViolation> {
    match raw.kind.as_str() {
        "heartbeat" => Ok(ClientMessage::Heartbeat),
        "request_initial_users" => Ok(ClientMessage::RequestInitialUsers),
        "avatar_move" => {
            let frame: AvatarMoveFrame = payload(&raw.kind, &raw.data)?;
            validate_position(frame.position)?;
            Ok(ClientMessage::AvatarMove(frame))
        }
        "poi_join" => {
            let frame: PoiFrame = payload(&raw.kind, &raw.data)?;
            non_empty("poiID", &frame.poi_id)?;
            Ok(ClientMessage::PoiJoin(frame))
        }
        "poi_leave" => {
            let frame: PoiFrame = payload(&raw.kind, &raw.data)?;
            non_empty("poiID", &frame.poi_id)?;
            Ok(ClientMessage::PoiLeave(frame))
        }
        "call_request" => {
            let frame: CallRequestFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::CallRequest(frame))
        }
        "call_accept" => {
            let frame: CallAnswerFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("callerUserID", &frame.caller_user_id)?;
            Ok(ClientMessage::CallAccept(frame))
        }
        "call_reject" => {
            let frame: CallAnswerFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("callerUserID", &frame.caller_user_id)?;
            Ok(ClientMessage::CallReject(frame))
        }
        "call_end" => {
            let frame: CallEndFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("otherUserID", &frame.other_user_id)?;
            Ok(ClientMessage::CallEnd(frame))
        }
        "webrtc_offer" => {
            let frame: SignalFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::WebrtcOffer(frame))
        }
        "webrtc_answer" => {
            let frame: SignalFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::WebrtcAnswer(frame))
        }
        "ice_candidate" => {
            let frame: CandidateFrame = payload(&raw.kind, &raw.data)?;
            non_empty("callID", &frame.call_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::IceCandidate(frame))
        }
        "poi_call_offer" => {
            let frame: PoiSignalFrame = payload(&raw.kind, &raw.data)?;
            non_empty("poiID", &frame.poi_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::PoiCallOffer(frame))
        }
        "poi_call_answer" => {
            let frame: PoiSignalFrame = payload(&raw.kind, &raw.data)?;
            non_empty("poiID", &frame.poi_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::PoiCallAnswer(frame))
        }
        "poi_call_ice_candidate" => {
            let frame: PoiCandidateFrame = payload(&raw.kind, &raw.data)?;
            non_empty("poiID", &frame.poi_id)?;
            non_empty("targetUserID", &frame.target_user_id)?;
            Ok(ClientMessage::PoiCallIceCandidate(frame))
        }
        other => Err(ProtocolViolation::UnknownType {
            kind: other.to_owned(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Cross-process pub/sub events (HTTP handlers -> event bridge)
// ---------------------------------------------------------------------------

/// Canonical POI membership as published by the durable side-effect path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiMembership {
    #[serde(rename = "poiID")]
    pub poi_id: String,
    #[serde(rename = "mapID")]
    pub map_id: String,
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "currentCount")]
    pub current_count: u32,
    #[serde(default)]
    pub participants: Vec<PoiParticipant>,
}

/// Events arriving on the pub/sub channel from HTTP-originated mutations.
///
/// The payload sits beside the `type` tag:
///
/// ```json
/// { "type": "poi_joined", "poiID": "p1", "mapID": "map-A", ... }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum BridgeEvent {
    PoiCreated(PoiSummary),
    PoiUpdated(PoiSummary),
    PoiDeleted(PoiDeleted),
    PoiJoined(PoiMembership),
    PoiLeft(PoiMembership),
}

impl BridgeEvent {
    /// The map whose sessions the event fans out to.
    pub fn map_id(&self) -> &str {
        match self {
            BridgeEvent::PoiCreated(poi) | BridgeEvent::PoiUpdated(poi) => &poi.map_id,
            BridgeEvent::PoiDeleted(deleted) => &deleted.map_id,
            BridgeEvent::PoiJoined(membership) | BridgeEvent::PoiLeft(membership) => {
                &membership.map_id
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
