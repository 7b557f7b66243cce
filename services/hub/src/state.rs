use crate::config::HubConfig;
use crate::event_bridge;
use crate::hub::Hub;
use crate::presence::PresenceGateway;
use crate::profile::ProfileService;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Depth of the in-process pub/sub plane carrying HTTP-originated events.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Everything a connection handler needs, cheap to clone.
///
/// The hub owns only its indices and the outbound queues; presence, profile
/// and rate-limit services are borrowed collaborators whose lifetime spans
/// the hub's.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub presence: Arc<dyn PresenceGateway>,
    pub profiles: Arc<dyn ProfileService>,
    pub limiter: Arc<dyn RateLimiter>,
    pub config: Arc<HubConfig>,
    events_tx: broadcast::Sender<String>,
}

impl AppState {
    /// Build the state, spawn the hub control loop and subscribe the event
    /// bridge to the pub/sub plane.
    pub fn new(
        config: HubConfig,
        presence: Arc<dyn PresenceGateway>,
        profiles: Arc<dyn ProfileService>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let hub = Hub::new(&config);
        let (events_tx, events_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        event_bridge::spawn(Arc::clone(&hub), events_rx);
        Self {
            hub,
            presence,
            profiles,
            limiter,
            config: Arc::new(config),
            events_tx,
        }
    }

    /// Publish a raw JSON event onto the pub/sub plane, as the HTTP side
    /// effects do.  Returns false when nothing is subscribed.
    pub fn publish_event(&self, payload: String) -> bool {
        self.events_tx.send(payload).is_ok()
    }
}
