//! User profile lookups for announcements.
//!
//! A missing profile is tolerated everywhere: the hub falls back to a short
//! prefix of the user id as the display name.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub about_me: Option<String>,
}

#[async_trait]
pub trait ProfileService: Send + Sync {
    /// `None` covers both "no such profile" and a failed lookup; callers
    /// apply the display-name fallback either way.
    async fn get_profile(&self, user_id: &str) -> Option<UserProfile>;
}

/// Display name used when no profile record exists.
pub fn fallback_display_name(user_id: &str) -> String {
    user_id.chars().take(8).collect()
}

/// Absolutise a profile avatar URL against the configured base origin.
/// Already-absolute URLs and an unconfigured base pass through untouched.
pub fn absolute_avatar_url(base_url: &str, avatar_url: &str) -> String {
    if base_url.is_empty()
        || avatar_url.starts_with("http://")
        || avatar_url.starts_with("https://")
    {
        return avatar_url.to_owned();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        avatar_url.trim_start_matches('/')
    )
}

/// In-memory profile service for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryProfiles {
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: &str, profile: UserProfile) {
        self.profiles
            .write()
            .await
            .insert(user_id.to_owned(), profile);
    }
}

#[async_trait]
impl ProfileService for MemoryProfiles {
    async fn get_profile(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.read().await.get(user_id).cloned()
    }
}
