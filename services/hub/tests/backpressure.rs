//! Backpressure: a client that stops draining its socket fills its bounded
//! outbound queue and is evicted; every other recipient keeps receiving.
mod support;

use hub::config::HubConfig;
use plaza_protocol::ServerMessage;
use plaza_test_utils::MockWsClient;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use support::TestServer;

fn big_poi_event(sequence: usize) -> String {
    // Large payloads saturate the stalled client's socket buffers quickly,
    // after which its bounded queue fills and eviction kicks in.
    json!({
        "type": "poi_created",
        "poiID": format!("p{sequence}"),
        "mapID": "map-A",
        "name": format!("poi-{sequence}"),
        "description": "x".repeat(256 * 1024),
        "position": {"lat": 0.0, "lng": 0.0},
        "createdBy": "u1",
        "maxParticipants": 8,
        "currentCount": 0
    })
    .to_string()
}

#[tokio::test]
async fn stalled_client_is_evicted_without_hurting_its_peers() {
    let config = HubConfig {
        outbound_queue_capacity: 32,
        // Long enough that queue overflow, not the write deadline, is what
        // removes the stalled client.
        write_deadline: Duration::from_secs(30),
        ..HubConfig::default()
    };
    let server = TestServer::start_with(config, None).await;
    server.seed_session("s1", "u1", "map-A").await;
    server.seed_session("s2", "u2", "map-A").await;

    let mut c1 = MockWsClient::connect(&server.ws_url(), "s1")
        .await
        .expect("connect s1");
    c1.recv_kind("welcome").await.expect("welcome");
    c1.recv_kind("initial_users").await.expect("initial_users");

    let mut c2 = MockWsClient::connect(&server.ws_url(), "s2")
        .await
        .expect("connect s2");
    c2.recv_kind("welcome").await.expect("welcome");
    c2.recv_kind("initial_users").await.expect("initial_users");
    c1.recv_kind("user_joined").await.expect("s2 joined");

    // The healthy peer drains continuously; the stalled one (c2) never
    // reads again.
    let received = Arc::new(AtomicUsize::new(0));
    let drain_counter = Arc::clone(&received);
    tokio::spawn(async move {
        loop {
            match c1.recv_envelope().await {
                Ok(envelope) => {
                    if let ServerMessage::PoiCreated(_) = envelope.message {
                        drain_counter.fetch_add(1, Ordering::SeqCst);
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut published = 0usize;
    for sequence in 0..1000 {
        assert!(server.state.publish_event(big_poi_event(sequence)));
        published += 1;
        tokio::time::sleep(Duration::from_millis(3)).await;
        if !server.state.hub.is_connected("s2").await {
            break;
        }
    }
    assert!(
        !server.state.hub.is_connected("s2").await,
        "stalled client should have been evicted"
    );
    assert!(
        server.state.hub.is_connected("s1").await,
        "healthy client must be unaffected"
    );

    // Drop isolation: broadcasts after the eviction still reach the
    // survivor, and nothing published before it was lost to s1.
    for sequence in 1000..1005 {
        server.state.publish_event(big_poi_event(sequence));
        published += 1;
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while received.load(Ordering::SeqCst) < published {
        assert!(
            tokio::time::Instant::now() < deadline,
            "survivor received {}/{published} broadcasts",
            received.load(Ordering::SeqCst)
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(received.load(Ordering::SeqCst), published);
}
