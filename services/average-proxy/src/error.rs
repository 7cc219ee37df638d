//! Service-specific error types

use thiserror::Error;

/// Startup errors raised while assembling the service from its config.
///
/// Per-request failures never appear here: the numbers handler folds them
/// into HTTP responses.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error("invalid window configuration: {0}")]
    Window(#[from] numbers_window::Error),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
