//! Configuration module for Margin

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::microblog::{DEFAULT_APP_NAME, DEFAULT_BASE_URL};
use crate::deeplink;
use crate::models::Feed;
use crate::paths;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Micro.blog host
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Number of posts to fetch per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// App name shown in the sign-in email
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Where the sign-in email sends the user back to
    #[serde(default = "deeplink::sign_in_redirect_url")]
    pub redirect_url: String,

    /// Feed shown after sign-in (timeline, mentions, bookmarks, discover)
    #[serde(default = "default_feed")]
    pub default_feed: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_feed() -> String {
    "timeline".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            app_name: default_app_name(),
            redirect_url: deeplink::sign_in_redirect_url(),
            default_feed: default_feed(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        paths::config_path()
    }

    /// Load config from the default path or create default
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path)
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// The configured default feed, falling back to the timeline
    pub fn default_feed(&self) -> Feed {
        Feed::from_str(&self.default_feed).unwrap_or_else(|| {
            tracing::warn!("Unknown default_feed '{}', using timeline", self.default_feed);
            Feed::Timeline
        })
    }

    /// Page size, never zero
    pub fn page_size(&self) -> usize {
        self.page_size.max(1)
    }
}
