//! Micro.blog API client

pub mod error;
pub mod microblog;
#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::Arc;

use crate::models::{Feed, Post, Profile, Session};

pub use error::ApiError;
pub use microblog::{DEFAULT_BASE_URL, MicroBlogClient, PostCreated};

/// Result of an API operation
pub type ApiResult<T> = Result<T, ApiError>;

/// Supplies the bearer token for authenticated requests.
///
/// Read on every request. `None` (or a blank string) means "not signed in";
/// the client then fails with [`ApiError::Auth`] without touching the network.
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, if any
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token, e.g. one passed on the command line
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl<T: TokenProvider + ?Sized> TokenProvider for Arc<T> {
    fn bearer_token(&self) -> Option<String> {
        (**self).bearer_token()
    }
}

/// One page of a paginated feed.
///
/// `before` asks for posts older than the given id, `since` for newer ones.
/// At most one of them may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Return posts older than this id
    pub before: Option<String>,
    /// Return posts newer than this id
    pub since: Option<String>,
    /// Page size
    pub count: usize,
}

impl PageRequest {
    /// The newest page
    pub const fn first(count: usize) -> Self {
        Self {
            before: None,
            since: None,
            count,
        }
    }

    /// The page right after `cursor` (older posts)
    pub fn before(cursor: impl Into<String>, count: usize) -> Self {
        Self {
            before: Some(cursor.into()),
            since: None,
            count,
        }
    }

    /// Posts newer than `cursor`
    pub fn since(cursor: impl Into<String>, count: usize) -> Self {
        Self {
            before: None,
            since: Some(cursor.into()),
            count,
        }
    }

    /// Check the request before anything is sent
    pub fn validate(&self) -> ApiResult<()> {
        if self.before.is_some() && self.since.is_some() {
            return Err(ApiError::InvalidArgument(
                "at most one of `before` and `since` may be set".to_string(),
            ));
        }
        if self.count == 0 {
            return Err(ApiError::InvalidArgument(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Query string for the feed endpoints
    pub(crate) fn query(&self) -> String {
        let mut query = format!("count={}", self.count);
        if let Some(before) = &self.before {
            query.push_str(&format!("&before_id={}", urlencoding::encode(before)));
        }
        if let Some(since) = &self.since {
            query.push_str(&format!("&since_id={}", urlencoding::encode(since)));
        }
        query
    }
}

/// The Micro.blog API surface used by the app
pub trait MicroBlogApi: Send + Sync {
    /// Ask the server to email a sign-in link
    fn request_sign_in_link(&self, email: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Exchange a temporary token from the sign-in link for a session
    fn verify_token(&self, temp_token: &str) -> impl Future<Output = ApiResult<Session>> + Send;

    /// Home timeline
    fn fetch_timeline(&self, page: PageRequest)
    -> impl Future<Output = ApiResult<Vec<Post>>> + Send;

    /// Posts mentioning the signed-in user
    fn fetch_mentions(&self, page: PageRequest)
    -> impl Future<Output = ApiResult<Vec<Post>>> + Send;

    /// Bookmarked posts
    fn fetch_bookmarks(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = ApiResult<Vec<Post>>> + Send;

    /// Discovery feed
    fn fetch_discover(&self, page: PageRequest)
    -> impl Future<Output = ApiResult<Vec<Post>>> + Send;

    /// Posts by one user
    fn fetch_user_posts(
        &self,
        username: &str,
        page: PageRequest,
    ) -> impl Future<Output = ApiResult<Vec<Post>>> + Send;

    /// A user's profile
    fn fetch_profile(&self, username: &str) -> impl Future<Output = ApiResult<Profile>> + Send;

    /// Publish a new post, optionally as a reply
    fn create_post(
        &self,
        content: &str,
        in_reply_to: Option<&str>,
    ) -> impl Future<Output = ApiResult<PostCreated>> + Send;

    /// Follow a user
    fn follow(&self, username: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Unfollow a user
    fn unfollow(&self, username: &str) -> impl Future<Output = ApiResult<()>> + Send;

    /// Move the timeline read marker to `post_id`
    fn mark_read(&self, post_id: &str) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Anything that can serve pages of a [`Feed`]. This is all the pager needs.
pub trait FeedSource: Send + Sync {
    /// Fetch one page of `feed`
    fn fetch_page(
        &self,
        feed: &Feed,
        page: PageRequest,
    ) -> impl Future<Output = ApiResult<Vec<Post>>> + Send;
}

impl<T: MicroBlogApi> FeedSource for T {
    async fn fetch_page(&self, feed: &Feed, page: PageRequest) -> ApiResult<Vec<Post>> {
        match feed {
            Feed::Timeline => self.fetch_timeline(page).await,
            Feed::Mentions => self.fetch_mentions(page).await,
            Feed::Bookmarks => self.fetch_bookmarks(page).await,
            Feed::Discover => self.fetch_discover(page).await,
            Feed::User(username) => self.fetch_user_posts(username, page).await,
        }
    }
}
