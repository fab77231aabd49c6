//! Sign-in deep links.
//!
//! The sign-in email links back into the app with the temporary token, e.g.
//! `margin://signin?token=ABC123`. Links opened in a browser instead carry the
//! same `token` query parameter on an `https://` URL.

use url::Url;

use crate::api::ApiError;

/// URL scheme registered for the app
pub const DEEP_LINK_SCHEME: &str = "margin";

/// Host part of the sign-in link
const SIGN_IN_HOST: &str = "signin";

/// Redirect URL passed to the sign-in endpoint
pub fn sign_in_redirect_url() -> String {
    format!("{DEEP_LINK_SCHEME}://{SIGN_IN_HOST}")
}

/// Extract the temporary token from a sign-in link
pub fn parse_sign_in_link(input: &str) -> Result<String, ApiError> {
    let url = Url::parse(input.trim())
        .map_err(|e| ApiError::InvalidArgument(format!("not a sign-in link: {e}")))?;

    let from_query = url
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned());

    let token = match url.scheme() {
        DEEP_LINK_SCHEME => {
            if url.host_str() != Some(SIGN_IN_HOST) {
                return Err(ApiError::InvalidArgument(format!(
                    "unsupported link: {input}"
                )));
            }
            // margin://signin/TOKEN
            from_query.or_else(|| {
                url.path_segments()
                    .and_then(|mut segments| segments.next())
                    .map(str::to_string)
            })
        }
        "http" | "https" => from_query,
        other => {
            return Err(ApiError::InvalidArgument(format!(
                "unsupported link scheme: {other}"
            )));
        }
    };

    token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidArgument("sign-in link has no token".to_string()))
}

/// Accept either a full sign-in link or a bare temporary token
pub fn temp_token_from(input: &str) -> Result<String, ApiError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ApiError::InvalidArgument(
            "temporary token must not be blank".to_string(),
        ));
    }
    if input.contains("://") {
        parse_sign_in_link(input)
    } else {
        Ok(input.to_string())
    }
}
