//! Feed definitions

/// A paginated list of posts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Feed {
    /// Home timeline of the signed-in user
    #[default]
    Timeline,
    /// Posts mentioning the signed-in user
    Mentions,
    /// Bookmarked posts
    Bookmarks,
    /// Curated discovery feed
    Discover,
    /// Posts by a single user
    User(String),
}

impl Feed {
    /// Get the display name
    pub fn name(&self) -> String {
        match self {
            Self::Timeline => "Timeline".to_string(),
            Self::Mentions => "Mentions".to_string(),
            Self::Bookmarks => "Bookmarks".to_string(),
            Self::Discover => "Discover".to_string(),
            Self::User(username) => format!("@{username}"),
        }
    }

    /// Parse a built-in feed from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "timeline" | "tl" | "home" => Some(Self::Timeline),
            "mentions" | "replies" => Some(Self::Mentions),
            "bookmarks" | "favorites" => Some(Self::Bookmarks),
            "discover" => Some(Self::Discover),
            _ => None,
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(Feed::from_str("TL"), Some(Feed::Timeline));
        assert_eq!(Feed::from_str("mentions"), Some(Feed::Mentions));
        assert_eq!(Feed::from_str("discover"), Some(Feed::Discover));
        assert_eq!(Feed::from_str("nope"), None);
        assert_eq!(Feed::User("manton".into()).to_string(), "@manton");
    }
}
