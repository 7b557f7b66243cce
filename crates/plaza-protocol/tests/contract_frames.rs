/// Contract golden tests: parse each frozen wire example into the typed
/// catalogue, serialize back, and verify the JSON is unchanged.  These pin
/// the exact field names clients are written against.
use plaza_protocol::{Envelope, ServerMessage};
use serde_json::Value;

/// Round-trip a server frame through `Envelope<ServerMessage>`.
fn round_trip(json_text: &str) -> ServerMessage {
    let envelope: Envelope<ServerMessage> =
        serde_json::from_str(json_text).unwrap_or_else(|e| panic!("deserialize: {e}\n{json_text}"));

    let serialized = serde_json::to_string(&envelope).expect("serialize");
    let original: Value = serde_json::from_str(json_text).unwrap();
    let reserialized: Value = serde_json::from_str(&serialized).unwrap();
    assert_eq!(original, reserialized, "round-trip mismatch for {json_text}");

    envelope.message
}

#[test]
fn welcome_frame() {
    let msg = round_trip(
        r#"{"type":"welcome","data":{"sessionID":"s2","userID":"u2","mapID":"map-A"},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::Welcome(welcome) => {
            assert_eq!(welcome.session_id, "s2");
            assert_eq!(welcome.user_id, "u2");
            assert_eq!(welcome.map_id, "map-A");
        }
        other => panic!("expected welcome, got {other:?}"),
    }
}

#[test]
fn initial_users_frame() {
    let msg = round_trip(
        r#"{"type":"initial_users","data":{"users":[{"sessionID":"s1","userID":"u1","displayName":"Alice","avatarURL":"https://cdn.example/a.png","aboutMe":"hi","position":{"lat":40.0,"lng":-73.0},"role":"user"}]},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::InitialUsers(initial) => {
            assert_eq!(initial.users.len(), 1);
            assert_eq!(initial.users[0].display_name, "Alice");
            assert_eq!(initial.users[0].role, "user");
        }
        other => panic!("expected initial_users, got {other:?}"),
    }
}

#[test]
fn user_joined_frame_without_optional_fields() {
    let msg = round_trip(
        r#"{"type":"user_joined","data":{"sessionID":"s2","userID":"u2","displayName":"u2-short","position":{"lat":0.0,"lng":0.0},"role":"user"},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::UserJoined(user) => {
            assert_eq!(user.avatar_url, None);
            assert_eq!(user.about_me, None);
        }
        other => panic!("expected user_joined, got {other:?}"),
    }
}

#[test]
fn avatar_moved_frame() {
    let msg = round_trip(
        r#"{"type":"avatar_moved","data":{"sessionID":"s1","userID":"u1","position":{"lat":40.7589,"lng":-73.9851}},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::AvatarMoved(moved) => {
            assert_eq!(moved.position.lat, 40.7589);
            assert_eq!(moved.position.lng, -73.9851);
        }
        other => panic!("expected avatar_moved, got {other:?}"),
    }
}

#[test]
fn optimistic_poi_joined_frame_carries_session_only() {
    let msg = round_trip(
        r#"{"type":"poi_joined","data":{"poiID":"p1","userID":"u1","sessionID":"s1"},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::PoiJoined(event) => {
            assert_eq!(event.session_id.as_deref(), Some("s1"));
            assert_eq!(event.current_count, None);
            assert_eq!(event.participants, None);
        }
        other => panic!("expected poi_joined, got {other:?}"),
    }
}

#[test]
fn canonical_poi_joined_frame_is_a_field_superset() {
    let msg = round_trip(
        r#"{"type":"poi_joined","data":{"poiID":"p1","userID":"u1","mapID":"map-A","currentCount":2,"participants":[{"id":"u1"},{"id":"u2","displayName":"Bob"}]},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::PoiJoined(event) => {
            assert_eq!(event.map_id.as_deref(), Some("map-A"));
            assert_eq!(event.current_count, Some(2));
            assert_eq!(event.participants.map(|p| p.len()), Some(2));
        }
        other => panic!("expected poi_joined, got {other:?}"),
    }
}

#[test]
fn poi_created_frame() {
    let msg = round_trip(
        r#"{"type":"poi_created","data":{"poiID":"p1","mapID":"map-A","name":"Fountain","description":"meet here","position":{"lat":1.0,"lng":2.0},"createdBy":"u1","maxParticipants":8,"currentCount":0},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::PoiCreated(poi) => {
            assert_eq!(poi.name, "Fountain");
            assert_eq!(poi.max_participants, 8);
        }
        other => panic!("expected poi_created, got {other:?}"),
    }
}

#[test]
fn call_request_fanout_frame() {
    let msg = round_trip(
        r#"{"type":"call_request","data":{"callID":"c1","callerInfo":{"userID":"u1","sessionID":"s1","displayName":"Alice"}},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::CallRequest(request) => {
            assert_eq!(request.caller_info.user_id, "u1");
            assert_eq!(request.caller_info.session_id, "s1");
        }
        other => panic!("expected call_request, got {other:?}"),
    }
}

#[test]
fn user_call_status_frame() {
    let msg = round_trip(
        r#"{"type":"user_call_status","data":{"userID":"u2","isInCall":true},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::UserCallStatus(status) => assert!(status.is_in_call),
        other => panic!("expected user_call_status, got {other:?}"),
    }
}

#[test]
fn webrtc_offer_fanout_frame() {
    let msg = round_trip(
        r#"{"type":"webrtc_offer","data":{"callID":"c1","fromUserID":"u1","sdp":{"type":"offer","sdp":"v=0"}},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::WebrtcOffer(signal) => {
            assert_eq!(signal.from_user_id, "u1");
            assert_eq!(signal.sdp["sdp"], "v=0");
        }
        other => panic!("expected webrtc_offer, got {other:?}"),
    }
}

#[test]
fn poi_call_ice_candidate_fanout_frame() {
    let msg = round_trip(
        r#"{"type":"poi_call_ice_candidate","data":{"poiID":"p1","fromUserID":"u1","candidate":{"candidate":"candidate:0","sdpMid":"0"}},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::PoiCallIceCandidate(candidate) => {
            assert_eq!(candidate.poi_id, "p1");
            assert_eq!(candidate.candidate["sdpMid"], "0");
        }
        other => panic!("expected poi_call_ice_candidate, got {other:?}"),
    }
}

#[test]
fn error_frame_with_retry_after() {
    let msg = round_trip(
        r#"{"type":"error","data":{"message":"rate limit exceeded for UpdateAvatar","code":"RATE_LIMITED","retryAfter":3},"timestamp":"2026-03-01T12:00:00Z"}"#,
    );
    match msg {
        ServerMessage::Error(error) => {
            assert_eq!(error.code.as_deref(), Some("RATE_LIMITED"));
            assert_eq!(error.retry_after, Some(3));
        }
        other => panic!("expected error, got {other:?}"),
    }
}
