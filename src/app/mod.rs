//! Application layer shared by every front end.
//!
//! Owns the session store and the API client, decides where the user starts,
//! runs the two-step email sign-in and hands out pagers for each feed.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::api::{ApiResult, MicroBlogApi, MicroBlogClient, PostCreated};
use crate::auth::SessionStore;
use crate::config::Config;
use crate::deeplink;
use crate::models::{Feed, Profile, Session};
use crate::pager::TimelinePager;

/// Where the app opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartScreen {
    /// No stored session
    SignIn,
    /// Signed in; show a feed
    Feed {
        /// Signed-in username
        username: String,
        /// Feed to show first
        feed: Feed,
    },
}

/// Application state
pub struct App {
    config: Config,
    store: Arc<SessionStore>,
    client: Arc<MicroBlogClient>,
}

impl App {
    /// Load config and session from their default locations
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let store = SessionStore::open_default()?;
        Ok(Self::new(config, store))
    }

    /// Create the app from an explicit config and store
    pub fn new(config: Config, store: SessionStore) -> Self {
        let store = Arc::new(store);
        let client = MicroBlogClient::new(&config.base_url, store.clone())
            .with_sign_in(&config.app_name, &config.redirect_url);

        Self {
            config,
            store,
            client: Arc::new(client),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The API client
    pub fn client(&self) -> &Arc<MicroBlogClient> {
        &self.client
    }

    /// The stored session, if signed in
    pub fn session(&self) -> Option<Session> {
        self.store.session()
    }

    /// Decide the initial screen from the stored session
    pub fn start_screen(&self) -> StartScreen {
        match self.store.session() {
            Some(session) => StartScreen::Feed {
                username: session.username,
                feed: self.config.default_feed(),
            },
            None => StartScreen::SignIn,
        }
    }

    /// Step one of sign-in: have the server email a link
    pub async fn request_sign_in(&self, email: &str) -> Result<()> {
        self.client
            .request_sign_in_link(email)
            .await
            .context("Failed to request sign-in link")?;
        tracing::info!("sign-in link requested");
        Ok(())
    }

    /// Step two of sign-in: verify the link (or bare token) and store the session.
    ///
    /// A rejected token also clears any stored session.
    pub async fn complete_sign_in(&self, link_or_token: &str) -> Result<Session> {
        let temp_token = deeplink::temp_token_from(link_or_token)?;

        match self.client.verify_token(&temp_token).await {
            Ok(session) => {
                self.store.save(&session)?;
                tracing::info!(username = %session.username, "signed in");
                Ok(session)
            }
            Err(e) => {
                if e.is_auth() {
                    self.store.clear()?;
                }
                Err(anyhow::Error::new(e).context("Sign-in failed"))
            }
        }
    }

    /// Forget the stored session
    pub fn sign_out(&self) -> Result<()> {
        self.store.clear()
    }

    /// A pager for `feed` with the configured page size
    pub fn pager(&self, feed: Feed) -> TimelinePager<MicroBlogClient> {
        TimelinePager::new(self.client.clone(), feed, self.config.page_size())
    }

    /// A pager for `feed` fetching `page_size` posts per page
    pub fn pager_with_size(&self, feed: Feed, page_size: usize) -> TimelinePager<MicroBlogClient> {
        TimelinePager::new(self.client.clone(), feed, page_size)
    }

    /// Publish a post
    pub async fn post(&self, content: &str, in_reply_to: Option<&str>) -> ApiResult<PostCreated> {
        self.client.create_post(content, in_reply_to).await
    }

    /// Fetch a profile
    pub async fn profile(&self, username: &str) -> ApiResult<Profile> {
        self.client.fetch_profile(username).await
    }

    /// Follow a user
    pub async fn follow(&self, username: &str) -> ApiResult<()> {
        self.client.follow(username).await
    }

    /// Unfollow a user
    pub async fn unfollow(&self, username: &str) -> ApiResult<()> {
        self.client.unfollow(username).await
    }

    /// Move the timeline read marker
    pub async fn mark_read(&self, post_id: &str) -> ApiResult<()> {
        self.client.mark_read(post_id).await
    }
}
