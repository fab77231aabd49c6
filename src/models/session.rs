//! Verified session returned by the sign-in flow

use serde::{Deserialize, Serialize};

/// A verified Micro.blog session.
///
/// Written once verification succeeds, read on every authenticated request,
/// and cleared on logout or when verification fails.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Long-lived bearer token
    pub token: String,
    /// Username of the signed-in account
    pub username: String,
    /// Display name
    pub display_name: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
}

impl Session {
    /// Create a new session
    pub fn new(token: &str, username: &str, display_name: &str) -> Self {
        Self {
            token: token.to_string(),
            username: username.to_string(),
            display_name: display_name.to_string(),
            avatar_url: None,
        }
    }

    /// Handle for display, e.g. `@manton`
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }
}

// Keep the bearer token out of logs
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("avatar_url", &self.avatar_url)
            .finish()
    }
}
