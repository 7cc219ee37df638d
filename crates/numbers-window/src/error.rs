//! Error types for window construction

/// Errors from window construction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("window capacity must be greater than 0")]
    ZeroCapacity,
}

/// Result alias for window operations.
pub type Result<T> = std::result::Result<T, Error>;
