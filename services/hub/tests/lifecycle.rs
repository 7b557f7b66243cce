//! Connection lifecycle: welcome, initial-users snapshot, join/leave
//! announcements, session takeover and snapshot replay after reconnect.
mod support;

use hub::config::HubConfig;
use plaza_protocol::ServerMessage;
use plaza_test_utils::MockWsClient;
use std::time::Duration;
use support::TestServer;

async fn connected(server: &TestServer, session_id: &str) -> MockWsClient {
    let mut client = MockWsClient::connect(&server.ws_url(), session_id)
        .await
        .expect("connect");
    client.recv_kind("welcome").await.expect("welcome");
    client.recv_kind("initial_users").await.expect("initial_users");
    client
}

#[tokio::test]
async fn second_client_sees_roster_and_first_sees_join_announcement() {
    let config = HubConfig {
        avatar_base_url: "https://cdn.example".to_owned(),
        ..HubConfig::default()
    };
    let server = TestServer::start_with(config, None).await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;
    server
        .seed_profile("u1", "Alice", Some("/uploads/alice.png"))
        .await;

    let mut c1 = MockWsClient::connect(&server.ws_url(), "s1")
        .await
        .expect("connect s1");
    match c1.recv_kind("welcome").await.expect("welcome") {
        ServerMessage::Welcome(welcome) => assert_eq!(welcome.session_id, "s1"),
        other => panic!("expected welcome, got {other:?}"),
    }
    match c1.recv_kind("initial_users").await.expect("initial_users") {
        ServerMessage::InitialUsers(initial) => {
            assert!(initial.users.is_empty(), "first client sees an empty map");
        }
        other => panic!("expected initial_users, got {other:?}"),
    }

    let mut c2 = MockWsClient::connect(&server.ws_url(), "s2")
        .await
        .expect("connect s2");
    c2.recv_kind("welcome").await.expect("welcome");
    match c2.recv_kind("initial_users").await.expect("initial_users") {
        ServerMessage::InitialUsers(initial) => {
            assert_eq!(initial.users.len(), 1);
            let user = &initial.users[0];
            assert_eq!(user.session_id, "s1");
            assert_eq!(user.user_id, "u1");
            assert_eq!(user.display_name, "Alice");
            // Relative profile URL absolutised against the configured base.
            assert_eq!(
                user.avatar_url.as_deref(),
                Some("https://cdn.example/uploads/alice.png")
            );
            assert_eq!(user.role, "user");
        }
        other => panic!("expected initial_users, got {other:?}"),
    }

    match c1.recv_kind("user_joined").await.expect("user_joined") {
        ServerMessage::UserJoined(joined) => {
            assert_eq!(joined.session_id, "s2");
            assert_eq!(joined.user_id, "u2");
            // No profile on record: first 8 chars of the user id.
            assert_eq!(joined.display_name, "u2");
            assert_eq!(joined.avatar_url, None);
        }
        other => panic!("expected user_joined, got {other:?}"),
    }
}

#[tokio::test]
async fn disconnect_announces_user_left_to_remaining_peers() {
    let server = TestServer::start().await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;

    let mut c1 = connected(&server, "s1").await;
    let mut c2 = connected(&server, "s2").await;
    c1.recv_kind("user_joined").await.expect("s2 joined");

    c2.close().await.expect("close");

    match c1.recv_kind("user_left").await.expect("user_left") {
        ServerMessage::UserLeft(left) => {
            assert_eq!(left.session_id, "s2");
            assert_eq!(left.user_id, "u2");
        }
        other => panic!("expected user_left, got {other:?}"),
    }
}

#[tokio::test]
async fn inactive_sessions_are_skipped_in_the_roster() {
    let server = TestServer::start().await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;
    server.seed_session("s3", "u3", "map-A").await;

    let _c1 = connected(&server, "s1").await;
    let _c2 = connected(&server, "s2").await;
    server.presence.set_active("s2", false).await;

    let mut c3 = MockWsClient::connect(&server.ws_url(), "s3")
        .await
        .expect("connect s3");
    c3.recv_kind("welcome").await.expect("welcome");
    match c3.recv_kind("initial_users").await.expect("initial_users") {
        ServerMessage::InitialUsers(initial) => {
            let sessions: Vec<&str> = initial.users.iter().map(|u| u.session_id.as_str()).collect();
            assert_eq!(sessions, vec!["s1"], "inactive s2 must be skipped");
        }
        other => panic!("expected initial_users, got {other:?}"),
    }
}

#[tokio::test]
async fn replayed_snapshot_request_matches_the_lifecycle_one() {
    let server = TestServer::start().await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;

    let _c1 = connected(&server, "s1").await;

    let mut c2 = MockWsClient::connect(&server.ws_url(), "s2")
        .await
        .expect("connect s2");
    c2.recv_kind("welcome").await.expect("welcome");
    let lifecycle_users = match c2.recv_kind("initial_users").await.expect("initial") {
        ServerMessage::InitialUsers(initial) => initial.users,
        other => panic!("expected initial_users, got {other:?}"),
    };

    // Drop and reconnect the same session, then replay the request.
    c2.close().await.expect("close");
    let mut c2 = MockWsClient::connect(&server.ws_url(), "s2")
        .await
        .expect("reconnect s2");
    c2.recv_kind("welcome").await.expect("welcome");
    c2.recv_kind("initial_users").await.expect("initial");

    c2.send_frame("request_initial_users", serde_json::json!({}))
        .await
        .expect("request");
    let replayed_users = match c2.recv_kind("initial_users").await.expect("replay") {
        ServerMessage::InitialUsers(initial) => initial.users,
        other => panic!("expected initial_users, got {other:?}"),
    };

    assert_eq!(lifecycle_users, replayed_users);
}

#[tokio::test]
async fn reconnect_takes_over_the_session_without_a_ghost_leave() {
    let server = TestServer::start().await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;

    let mut c1 = connected(&server, "s1").await;
    let mut c2a = connected(&server, "s2").await;
    c1.recv_kind("user_joined").await.expect("first join");

    // Same session id connects again: the hub evicts the old connection.
    let mut c2b = connected(&server, "s2").await;
    c1.recv_kind("user_joined").await.expect("re-join announcement");

    // The replaced connection observes closure rather than an error frame.
    assert!(c2a.recv_message().await.is_err());

    // No user_left for a session that was taken over, not abandoned.
    c1.expect_silence(Duration::from_millis(300))
        .await
        .expect("no ghost user_left");

    // The surviving connection still works.
    c2b.send_frame("heartbeat", serde_json::json!({}))
        .await
        .expect("heartbeat");
    c2b.recv_kind("pong").await.expect("pong");
}
