//! Errors returned at the API client boundary

/// Failure of a single API operation. Nothing is retried; each error is
/// final for the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Transport or connectivity failure
    #[error("network error: {0}")]
    Network(String),
    /// Missing, invalid or expired token
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The caller broke an operation's contract; no request was sent
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Creating a post did not succeed
    #[error("{}", post_failed_message(.status, .message))]
    PostFailed {
        /// HTTP status, if the server answered at all
        status: Option<u16>,
        /// Server response body or transport error
        message: String,
    },
    /// Unexpected HTTP status
    #[error("server returned HTTP {0}")]
    Status(u16),
    /// Response body could not be decoded
    #[error("unexpected response: {0}")]
    Decode(String),
}

fn post_failed_message(status: &Option<u16>, message: &str) -> String {
    match (*status, message.is_empty()) {
        (Some(code), true) => format!("post failed with HTTP {code}"),
        (Some(code), false) => format!("post failed with HTTP {code}: {message}"),
        (None, _) => format!("post failed: {message}"),
    }
}

impl ApiError {
    /// Whether signing in again could fix this
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// HTTP status carried by this error, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::PostFailed { status, .. } => *status,
            Self::Status(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_failed_display() {
        let err = ApiError::PostFailed {
            status: Some(500),
            message: String::new(),
        };
        assert_eq!(err.to_string(), "post failed with HTTP 500");
        assert_eq!(err.status(), Some(500));

        let err = ApiError::PostFailed {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "post failed: connection refused");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_is_auth() {
        assert!(ApiError::Auth("expired".into()).is_auth());
        assert!(!ApiError::Network("down".into()).is_auth());
    }
}
