//! Health probes and the occupancy stats endpoint.
mod support;

use plaza_test_utils::MockWsClient;
use support::TestServer;

#[tokio::test]
async fn health_probes_answer_ok() {
    let server = TestServer::start().await;

    let body = reqwest::get(server.http_url("/healthz"))
        .await
        .expect("healthz")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "ok");

    let body = reqwest::get(server.http_url("/readyz"))
        .await
        .expect("readyz")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn unknown_routes_fall_back_to_404() {
    let server = TestServer::start().await;
    let status = reqwest::get(server.http_url("/api/v1/nope"))
        .await
        .expect("request")
        .status();
    assert_eq!(status.as_u16(), 404);
}

#[tokio::test]
async fn stats_reflect_per_map_occupancy() {
    let server = TestServer::start().await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;
    server.seed_session("s3", "u3", "map-B").await;

    let mut clients = Vec::new();
    for session_id in ["s1", "s2", "s3"] {
        let mut client = MockWsClient::connect(&server.ws_url(), session_id)
            .await
            .expect("connect");
        client.recv_kind("welcome").await.expect("welcome");
        clients.push(client);
    }

    let stats: serde_json::Value = reqwest::get(server.http_url("/api/v1/stats"))
        .await
        .expect("stats")
        .json()
        .await
        .expect("json");

    assert_eq!(stats["connections"], 3);
    assert_eq!(stats["maps"][0]["mapID"], "map-A");
    assert_eq!(stats["maps"][0]["sessions"], 2);
    assert_eq!(stats["maps"][1]["mapID"], "map-B");
    assert_eq!(stats["maps"][1]["sessions"], 1);
}
