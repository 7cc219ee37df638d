//! Fetch outcome classification
//!
//! The only place that decides how a failed fetch reaches the HTTP caller.
//! Under the default `Lenient` policy every fetch failure other than a missing
//! token collapses into "no new numbers", so a client cannot tell a failed
//! fetch from an empty one. `Strict` surfaces genuine upstream failures.

use crate::{FetchError, Result};

/// How genuine upstream failures are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Fold fetch failures into an unchanged-window success
    #[default]
    Lenient,
    /// Report fetch failures as a bad gateway
    Strict,
}

impl ErrorPolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            ErrorPolicy::Strict
        } else {
            ErrorPolicy::Lenient
        }
    }
}

/// What the request handler should do with a fetch outcome.
#[derive(Debug)]
pub enum FetchDisposition {
    /// Merge these numbers (possibly none) into the window
    Merge(Vec<i64>),
    /// Nothing fetched and no token held
    AuthFailure,
    /// Upstream failed and the policy is strict
    UpstreamFailure(FetchError),
}

/// Classify a fetch result.
///
/// `token_held` is the token state re-checked after the fetch: an empty result
/// while no credential is held means authentication failed, whatever the
/// fetch itself reported. Unknown type codes always leave the window unchanged.
pub fn classify_fetch(
    result: Result<Vec<i64>>,
    token_held: bool,
    policy: ErrorPolicy,
) -> FetchDisposition {
    match result {
        Err(FetchError::UnknownType(_)) => FetchDisposition::Merge(Vec::new()),
        Ok(numbers) if numbers.is_empty() && !token_held => FetchDisposition::AuthFailure,
        Ok(numbers) => FetchDisposition::Merge(numbers),
        Err(_) if !token_held => FetchDisposition::AuthFailure,
        Err(FetchError::Auth(_)) if policy == ErrorPolicy::Strict => FetchDisposition::AuthFailure,
        Err(e) => match policy {
            ErrorPolicy::Strict => FetchDisposition::UpstreamFailure(e),
            ErrorPolicy::Lenient => FetchDisposition::Merge(Vec::new()),
        },
    }
}
