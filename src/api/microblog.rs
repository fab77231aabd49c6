//! Micro.blog HTTP client

use std::sync::Arc;

use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Deserializer};

use crate::models::{Author, Post, Profile, Session};

use super::{ApiError, ApiResult, MicroBlogApi, PageRequest, TokenProvider};

/// Default Micro.blog host
pub const DEFAULT_BASE_URL: &str = "https://micro.blog";

/// Default app name shown in the sign-in email
pub const DEFAULT_APP_NAME: &str = "Margin";

/// Outcome of a successful post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCreated {
    /// URL of the new post, when the server reports one
    pub url: Option<String>,
}

/// Micro.blog API client
pub struct MicroBlogClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    app_name: String,
    redirect_url: String,
}

impl MicroBlogClient {
    /// Create a new client against `base_url`
    pub fn new(base_url: &str, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            app_name: DEFAULT_APP_NAME.to_string(),
            redirect_url: crate::deeplink::sign_in_redirect_url(),
        }
    }

    /// Set the app name and redirect URL sent with sign-in requests
    pub fn with_sign_in(mut self, app_name: &str, redirect_url: &str) -> Self {
        self.app_name = app_name.to_string();
        self.redirect_url = redirect_url.to_string();
        self
    }

    /// Base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build API URL
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// The bearer token, or an auth error if there is none
    fn bearer(&self) -> ApiResult<String> {
        self.tokens
            .bearer_token()
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ApiError::Auth("not signed in".to_string()))
    }

    async fn get_feed(&self, endpoint: &str, page: &PageRequest) -> ApiResult<FeedResponse> {
        page.validate()?;
        let token = self.bearer()?;
        let url = format!("{}?{}", self.api_url(endpoint), page.query());
        tracing::debug!(%url, "fetching feed");

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;

        let feed: FeedResponse = check_status(response)?.json().await?;
        Ok(feed)
    }

    async fn fetch_posts(&self, endpoint: &str, page: PageRequest) -> ApiResult<Vec<Post>> {
        let feed = self.get_feed(endpoint, &page).await?;
        tracing::debug!(endpoint, count = feed.items.len(), "feed page received");
        Ok(feed.items.into_iter().map(FeedItem::into_post).collect())
    }

    async fn post_form(&self, endpoint: &str, form: &[(&str, &str)]) -> ApiResult<()> {
        let token = self.bearer()?;
        let response = self
            .client
            .post(self.api_url(endpoint))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .form(form)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }
}

/// Map auth failures and other non-success statuses
fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::warn!(%status, url = %response.url(), "token rejected");
        return Err(ApiError::Auth(format!(
            "server rejected the token (HTTP {})",
            status.as_u16()
        )));
    }
    if !status.is_success() {
        tracing::warn!(%status, url = %response.url(), "request failed");
        return Err(ApiError::Status(status.as_u16()));
    }
    Ok(response)
}

fn require(value: &str, what: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        Err(ApiError::InvalidArgument(format!("{what} must not be blank")))
    } else {
        Ok(())
    }
}

impl MicroBlogApi for MicroBlogClient {
    async fn request_sign_in_link(&self, email: &str) -> ApiResult<()> {
        require(email, "email")?;
        let url = self.api_url("/account/signin");
        tracing::debug!(%url, "requesting sign-in link");

        let params = [
            ("email", email.trim()),
            ("app_name", self.app_name.as_str()),
            ("redirect_url", self.redirect_url.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;
        check_status(response)?;
        Ok(())
    }

    async fn verify_token(&self, temp_token: &str) -> ApiResult<Session> {
        require(temp_token, "temporary token")?;
        let url = self.api_url("/account/verify");

        let response = self
            .client
            .post(&url)
            .form(&[("token", temp_token.trim())])
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::BAD_REQUEST
                | StatusCode::UNAUTHORIZED
                | StatusCode::FORBIDDEN
                | StatusCode::NOT_FOUND
        ) {
            return Err(ApiError::Auth(format!(
                "sign-in link is invalid or expired (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        let verified: VerifyResponse = response.json().await?;
        verified.into_session()
    }

    async fn fetch_timeline(&self, page: PageRequest) -> ApiResult<Vec<Post>> {
        self.fetch_posts("/posts/timeline", page).await
    }

    async fn fetch_mentions(&self, page: PageRequest) -> ApiResult<Vec<Post>> {
        self.fetch_posts("/posts/mentions", page).await
    }

    async fn fetch_bookmarks(&self, page: PageRequest) -> ApiResult<Vec<Post>> {
        self.fetch_posts("/posts/bookmarks", page).await
    }

    async fn fetch_discover(&self, page: PageRequest) -> ApiResult<Vec<Post>> {
        self.fetch_posts("/posts/discover", page).await
    }

    async fn fetch_user_posts(&self, username: &str, page: PageRequest) -> ApiResult<Vec<Post>> {
        require(username, "username")?;
        let endpoint = format!("/posts/{}", urlencoding::encode(username.trim()));
        self.fetch_posts(&endpoint, page).await
    }

    async fn fetch_profile(&self, username: &str) -> ApiResult<Profile> {
        require(username, "username")?;
        let endpoint = format!("/posts/{}", urlencoding::encode(username.trim()));
        let feed = self.get_feed(&endpoint, &PageRequest::first(1)).await?;
        Ok(feed.into_profile(username.trim()))
    }

    async fn create_post(&self, content: &str, in_reply_to: Option<&str>) -> ApiResult<PostCreated> {
        require(content, "post content")?;
        let token = self.bearer()?;
        let url = self.api_url("/micropub");

        let mut form = vec![("h", "entry"), ("content", content)];
        if let Some(reply_to) = in_reply_to {
            form.push(("in-reply-to", reply_to));
        }

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .form(&form)
            .send()
            .await
            .map_err(|e| ApiError::PostFailed {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::CREATED || status == StatusCode::ACCEPTED {
            let url = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            tracing::debug!(?url, "post created");
            return Ok(PostCreated { url });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%status, "post failed");
        Err(ApiError::PostFailed {
            status: Some(status.as_u16()),
            message: body.trim().to_string(),
        })
    }

    async fn follow(&self, username: &str) -> ApiResult<()> {
        require(username, "username")?;
        self.post_form("/users/follow", &[("username", username.trim())])
            .await
    }

    async fn unfollow(&self, username: &str) -> ApiResult<()> {
        require(username, "username")?;
        self.post_form("/users/unfollow", &[("username", username.trim())])
            .await
    }

    async fn mark_read(&self, post_id: &str) -> ApiResult<()> {
        require(post_id, "post id")?;
        let token = self.bearer()?;

        let body = serde_json::json!({ "timeline": { "last_read_id": post_id } });
        let response = self
            .client
            .post(self.api_url("/posts/markers"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .json(&body)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }
}

// ==================== API Types ====================

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    token: Option<String>,
    #[serde(default)]
    username: String,
    name: Option<String>,
    full_name: Option<String>,
    avatar: Option<String>,
    gravatar_url: Option<String>,
    error: Option<String>,
}

impl VerifyResponse {
    fn into_session(self) -> ApiResult<Session> {
        if let Some(error) = self.error.filter(|e| !e.is_empty()) {
            return Err(ApiError::Auth(error));
        }
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApiError::Auth("server did not return a token".to_string()))?;

        let display_name = non_empty(self.name)
            .or_else(|| non_empty(self.full_name))
            .unwrap_or_else(|| self.username.clone());

        Ok(Session {
            token,
            username: self.username,
            display_name,
            avatar_url: non_empty(self.avatar).or_else(|| non_empty(self.gravatar_url)),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    items: Vec<FeedItem>,
    #[serde(default)]
    author: Option<FeedAuthor>,
    #[serde(default, rename = "_microblog")]
    microblog: Option<FeedMeta>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    content_html: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    date_published: Option<String>,
    #[serde(default)]
    author: FeedAuthor,
}

#[derive(Debug, Default, Deserialize)]
struct FeedAuthor {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
    #[serde(default, rename = "_microblog")]
    microblog: Option<AuthorMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthorMeta {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedMeta {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    following_count: Option<u32>,
    #[serde(default)]
    is_following: Option<bool>,
    #[serde(default)]
    is_you: Option<bool>,
}

/// Post ids arrive as strings from most endpoints and as numbers from some
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Number(u64),
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(id) => id,
        IdRepr::Number(id) => id.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FeedAuthor {
    fn into_author(self) -> Author {
        let name = self.name.unwrap_or_default();
        let username = self
            .microblog
            .and_then(|m| m.username)
            .unwrap_or_else(|| name.clone());
        Author {
            username,
            name,
            avatar_url: non_empty(self.avatar),
        }
    }
}

impl FeedItem {
    fn into_post(self) -> Post {
        Post {
            id: self.id,
            content_html: self.content_html.unwrap_or_default(),
            published: self.date_published.unwrap_or_default(),
            author: self.author.into_author(),
            url: self.url.unwrap_or_default(),
        }
    }
}

impl FeedResponse {
    fn into_profile(self, requested: &str) -> Profile {
        let author = self.author.unwrap_or_default();
        let meta = self.microblog.unwrap_or_default();
        Profile {
            username: meta.username.unwrap_or_else(|| requested.to_string()),
            name: author.name.unwrap_or_default(),
            avatar_url: non_empty(author.avatar),
            url: non_empty(author.url),
            bio: meta.bio.unwrap_or_default(),
            following_count: meta.following_count.unwrap_or(0),
            is_following: meta.is_following.unwrap_or(false),
            is_you: meta.is_you.unwrap_or(false),
        }
    }
}
