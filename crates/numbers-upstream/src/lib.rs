//! Upstream number endpoints
//!
//! Maps the one-letter type codes to their endpoints (`registry`), performs a
//! single bearer-authenticated fetch per call (`client`), and decides how a
//! failed fetch is surfaced to the HTTP caller (`classify`). The fetch itself
//! never deduplicates or orders numbers; that belongs to the window.

pub mod classify;
pub mod client;
pub mod registry;

#[cfg(test)]
mod mock;

pub use classify::{ErrorPolicy, FetchDisposition, classify_fetch};
pub use client::UpstreamClient;
pub use registry::{TypeCode, UpstreamTypeRegistry};

use std::time::Duration;

/// Default timeout for a single numbers fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Why a fetch produced no numbers.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unknown type code: {0:?}")]
    UnknownType(String),

    #[error("no token available: {0}")]
    Auth(#[from] numbers_auth::Error),

    #[error("upstream timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream request failed: {0}")]
    Transport(String),

    #[error("invalid upstream response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Label for the `error_type` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UnknownType(_) => "unknown_type",
            FetchError::Auth(_) => "auth",
            FetchError::Timeout(_) => "timeout",
            FetchError::Status { .. } => "status",
            FetchError::Transport(_) => "transport",
            FetchError::Decode(_) => "decode",
        }
    }
}

/// Result alias for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
