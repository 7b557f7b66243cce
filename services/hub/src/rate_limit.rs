//! Rate-limit contract consulted before every mutating or fan-out message.
//!
//! The limiter itself is an external collaborator; the hub only carries the
//! interface plus a fixed-window in-memory implementation for
//! single-process deployments and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Limited action buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateAction {
    UpdateAvatar,
    JoinPoi,
    LeavePoi,
    /// All 1:1 and POI-scoped call-signalling frames.
    CallSignal,
}

impl fmt::Display for RateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RateAction::UpdateAvatar => "UpdateAvatar",
            RateAction::JoinPoi => "JoinPOI",
            RateAction::LeavePoi => "LeavePOI",
            RateAction::CallSignal => "CallSignal",
        };
        f.write_str(name)
    }
}

/// Typed rejection carrying the retry-after hint forwarded to the client.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("rate limit exceeded for {action}")]
pub struct RateLimitExceeded {
    pub action: RateAction,
    pub retry_after: Duration,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, user_id: &str, action: RateAction) -> Result<(), RateLimitExceeded>;
}

/// Fixed-window counter per `(user, action)` pair.
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    counters: Mutex<HashMap<(String, RateAction), WindowState>>,
}

struct WindowState {
    window_start: Instant,
    count: u32,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            counters: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn check(&self, user_id: &str, action: RateAction) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut counters = self
            .counters
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = counters
            .entry((user_id.to_owned(), action))
            .or_insert(WindowState {
                window_start: now,
                count: 0,
            });

        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count < self.limit {
            state.count += 1;
            return Ok(());
        }

        let elapsed = now.duration_since(state.window_start);
        Err(RateLimitExceeded {
            action,
            retry_after: self.window.saturating_sub(elapsed),
        })
    }
}
