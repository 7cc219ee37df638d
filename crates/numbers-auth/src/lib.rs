//! Bearer-token management for the numbers evaluation service
//!
//! Owns the single short-lived credential used to call the upstream number
//! endpoints. This crate has no dependency on the proxy binary and can be
//! tested on its own.
//!
//! Credential flow:
//! 1. `TokenCache::ensure_valid_token()` returns the cached token while it is
//!    unexpired
//! 2. Otherwise it POSTs the `Identity` payload via `token::request_token()`
//! 3. The granted validity is clamped (`constants::MAX_VALIDITY_SECS`) and the
//!    credential is stored with an absolute expiry
//! 4. On any failure the credential is cleared, never left stale

pub mod cache;
pub mod constants;
pub mod error;
pub mod identity;
pub mod token;

#[cfg(test)]
mod mock;

pub use cache::{Credential, TokenCache};
pub use constants::*;
pub use error::{Error, Result};
pub use identity::Identity;
pub use token::{TokenGrant, TokenResponse, request_token};
