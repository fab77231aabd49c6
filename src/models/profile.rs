//! User profile model

use serde::{Deserialize, Serialize};

/// A user's public profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Username
    pub username: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// Blog URL
    pub url: Option<String>,
    /// Bio (plain text)
    pub bio: String,
    /// How many accounts this user follows
    pub following_count: u32,
    /// Whether the signed-in user follows them
    pub is_following: bool,
    /// Whether this is the signed-in user
    pub is_you: bool,
}
