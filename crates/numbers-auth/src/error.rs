//! Error types for token acquisition

use std::time::Duration;

/// Errors from the authentication endpoint or the token cache.
///
/// `Clone` so that callers waiting on an in-flight refresh can receive the
/// same failure the refreshing caller saw.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("auth request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("auth endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    Malformed(String),

    #[error("token unavailable: {0}")]
    Unavailable(String),
}

impl Error {
    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::Rejected { .. } => "rejected",
            Error::Malformed(_) => "malformed",
            Error::Unavailable(_) => "unavailable",
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_status_and_body() {
        let err = Error::Rejected {
            status: 401,
            body: "bad client secret".into(),
        };
        assert_eq!(err.to_string(), "auth endpoint returned 401: bad client secret");
    }

    #[test]
    fn timeout_display_in_seconds() {
        let err = Error::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "auth request timed out after 5s");
    }

    #[test]
    fn kinds_are_stable_labels() {
        assert_eq!(Error::Http("x".into()).kind(), "http");
        assert_eq!(Error::Malformed("x".into()).kind(), "malformed");
        assert_eq!(Error::Unavailable("x".into()).kind(), "unavailable");
    }
}
