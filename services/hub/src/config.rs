use std::env;
use std::time::Duration;

/// Per-client outbound queue depth.  A client whose queue is full at enqueue
/// time is considered stalled and is evicted.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Depth of the hub's broadcast command queue.  Commands submitted while the
/// queue is full are dropped with a warning.
pub const BROADCAST_QUEUE_CAPACITY: usize = 100;

/// A connection that produces no frame (including pongs) for this long is
/// disconnected.
pub const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Upper bound on a single socket write.
pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

/// Keepalive ping cadence.  Must stay strictly below [`READ_IDLE_TIMEOUT`]
/// so a healthy peer's pongs keep the read side alive.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(54);

/// Tunables of the real-time hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub outbound_queue_capacity: usize,
    pub broadcast_queue_capacity: usize,
    pub read_idle_timeout: Duration,
    pub write_deadline: Duration,
    pub keepalive_interval: Duration,
    /// Origin prepended to relative avatar URLs in announcements.  Empty
    /// means avatar URLs pass through untouched.
    pub avatar_base_url: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: OUTBOUND_QUEUE_CAPACITY,
            broadcast_queue_capacity: BROADCAST_QUEUE_CAPACITY,
            read_idle_timeout: READ_IDLE_TIMEOUT,
            write_deadline: WRITE_DEADLINE,
            keepalive_interval: KEEPALIVE_INTERVAL,
            avatar_base_url: String::new(),
        }
    }
}

impl HubConfig {
    /// Defaults overridden from the environment (`AVATAR_BASE_URL`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = env::var("AVATAR_BASE_URL") {
            config.avatar_base_url = base_url;
        }
        config
    }
}
