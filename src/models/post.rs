//! Post model as served by the Micro.blog JSON feeds

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The author of a post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Micro.blog username (without the leading @)
    pub username: String,
    /// Display name
    pub name: String,
    /// Avatar URL
    pub avatar_url: Option<String>,
}

impl Author {
    /// Handle for display, e.g. `@manton`
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }
}

/// A post as fetched from the server. Never modified after it is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Server-assigned identifier, also used as the pagination cursor
    pub id: String,
    /// Body as HTML
    pub content_html: String,
    /// Publish timestamp (ISO-8601, as sent by the server)
    pub published: String,
    /// Who wrote it
    pub author: Author,
    /// Canonical URL of the post
    pub url: String,
}

impl Post {
    /// Create an empty post with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_html: String::new(),
            published: String::new(),
            author: Author::default(),
            url: String::new(),
        }
    }

    /// Body with HTML stripped and entities decoded
    pub fn plain_text(&self) -> String {
        strip_html(&self.content_html)
    }

    /// Parsed publish time, `None` if the server sent something unparseable
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.published)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Get a short preview of the content (for list display)
    pub fn preview(&self, max_len: usize) -> String {
        let content = self.plain_text().replace('\n', " ");
        if content.chars().count() <= max_len {
            content
        } else {
            let cut: String = content.chars().take(max_len.saturating_sub(3)).collect();
            format!("{cut}...")
        }
    }

    /// Get relative time string (e.g., "5m", "2h", "3d")
    pub fn relative_time(&self) -> String {
        let Some(published) = self.published_at() else {
            return String::new();
        };
        let duration = Utc::now().signed_duration_since(published);

        if duration.num_seconds() < 60 {
            format!("{}s", duration.num_seconds().max(0))
        } else if duration.num_minutes() < 60 {
            format!("{}m", duration.num_minutes())
        } else if duration.num_hours() < 24 {
            format!("{}h", duration.num_hours())
        } else if duration.num_days() < 7 {
            format!("{}d", duration.num_days())
        } else {
            published.format("%b %d").to_string()
        }
    }
}

/// Turn post HTML into readable plain text
fn strip_html(html: &str) -> String {
    let text = html
        .replace("<br>", "\n")
        .replace("<br/>", "\n")
        .replace("<br />", "\n")
        .replace("</p><p>", "\n\n")
        .replace("</p>\n<p>", "\n\n");

    // Tags first, entities after, so an escaped `&lt;b&gt;` survives as text
    let text = regex_lite::Regex::new(r"<[^>]+>")
        .map(|re| re.replace_all(&text, "").to_string())
        .unwrap_or(text);

    html_escape::decode_html_entities(&text).trim().to_string()
}
