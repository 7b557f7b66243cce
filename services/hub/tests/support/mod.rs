//! Shared scaffolding for the hub integration suites: an ephemeral server
//! over in-memory collaborators, plus presence/profile seeding helpers.
#![allow(dead_code)]

use hub::config::HubConfig;
use hub::presence::{MemoryPresence, SessionSnapshot};
use hub::profile::{MemoryProfiles, UserProfile};
use hub::rate_limit::{FixedWindowLimiter, RateLimiter};
use hub::state::AppState;
use plaza_protocol::Position;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

pub struct TestServer {
    pub state: AppState,
    pub presence: Arc<MemoryPresence>,
    pub profiles: Arc<MemoryProfiles>,
    pub addr: SocketAddr,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(HubConfig::default(), None).await
    }

    pub async fn start_with(config: HubConfig, limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        let presence = Arc::new(MemoryPresence::new());
        let profiles = Arc::new(MemoryProfiles::new());
        // Generous default limits: scenario tests that exercise rejection
        // inject their own limiter.
        let limiter = limiter
            .unwrap_or_else(|| Arc::new(FixedWindowLimiter::new(10_000, Duration::from_secs(60))));
        Self::start_with_presence(config, presence, profiles, limiter).await
    }

    pub async fn start_with_presence(
        config: HubConfig,
        presence: Arc<MemoryPresence>,
        profiles: Arc<MemoryProfiles>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let state = AppState::new(config, presence.clone(), profiles.clone(), limiter);
        let addr = serve(state.clone()).await;
        Self {
            state,
            presence,
            profiles,
            addr,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn seed_session(&self, session_id: &str, user_id: &str, map_id: &str) {
        self.presence
            .insert(SessionSnapshot {
                session_id: session_id.to_owned(),
                user_id: user_id.to_owned(),
                map_id: map_id.to_owned(),
                avatar_pos: Position { lat: 0.0, lng: 0.0 },
                is_active: true,
            })
            .await;
    }

    pub async fn seed_profile(&self, user_id: &str, display_name: &str, avatar_url: Option<&str>) {
        self.profiles
            .insert(
                user_id,
                UserProfile {
                    display_name: display_name.to_owned(),
                    avatar_url: avatar_url.map(ToOwned::to_owned),
                    about_me: None,
                },
            )
            .await;
    }
}

/// Serve `state` on an ephemeral port; the task dies with the test runtime.
pub async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let router = hub::build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}
