//! Token validity bounds and request defaults

use std::time::Duration;

/// Validity assumed when the auth response omits `expires_in`, and the
/// fallback when the reported validity exceeds `MAX_VALIDITY_SECS`.
pub const DEFAULT_VALIDITY_SECS: u64 = 300;

/// Longest validity accepted from the auth endpoint. Anything above this is
/// treated as a provider error.
pub const MAX_VALIDITY_SECS: u64 = 3600;

/// Default timeout for the authentication request.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);
