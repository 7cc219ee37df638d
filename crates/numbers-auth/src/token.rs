//! Token request against the authentication endpoint
//!
//! One POST per call, no retries. The response's `expires_in` is a delta in
//! seconds; `effective_validity` applies the default and the upper clamp
//! before the cache turns it into an absolute expiry.

use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use tracing::debug;

use crate::constants::{DEFAULT_VALIDITY_SECS, MAX_VALIDITY_SECS};
use crate::error::{Error, Result};
use crate::identity::Identity;

/// Body returned by the authentication endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Seconds until the token expires (delta, not absolute). Any JSON number
    /// is accepted; missing means `DEFAULT_VALIDITY_SECS`.
    #[serde(default)]
    pub expires_in: Option<f64>,
}

/// A granted token with its clamped validity.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: Secret<String>,
    pub validity: Duration,
}

/// Map the reported validity to the one the cache will honour.
///
/// A validity longer than `MAX_VALIDITY_SECS` is a provider error and falls
/// back to `DEFAULT_VALIDITY_SECS`. Zero or negative validity yields a token
/// that is already expired, so the next caller refreshes again.
pub fn effective_validity(expires_in: Option<f64>) -> Duration {
    match expires_in {
        None => Duration::from_secs(DEFAULT_VALIDITY_SECS),
        Some(secs) if secs > MAX_VALIDITY_SECS as f64 => Duration::from_secs(DEFAULT_VALIDITY_SECS),
        Some(secs) if secs > 0.0 => Duration::from_secs_f64(secs),
        Some(_) => Duration::ZERO,
    }
}

/// Request a fresh bearer token for `identity`.
pub async fn request_token(
    client: &reqwest::Client,
    auth_url: &str,
    identity: &Identity,
    timeout: Duration,
) -> Result<TokenGrant> {
    let response = client
        .post(auth_url)
        .json(&identity.auth_request())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(timeout)
            } else {
                Error::Http(format!("token request failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::Http(format!("reading token response: {e}")))?;
    let parsed: TokenResponse =
        serde_json::from_str(&body).map_err(|e| Error::Malformed(e.to_string()))?;

    if parsed.access_token.is_empty() {
        return Err(Error::Malformed("access_token is empty".into()));
    }

    let validity = effective_validity(parsed.expires_in);
    if parsed.expires_in.is_some_and(|secs| secs > MAX_VALIDITY_SECS as f64) {
        debug!(
            reported_secs = parsed.expires_in,
            validity_secs = validity.as_secs(),
            "auth endpoint reported excessive validity, clamping"
        );
    }

    Ok(TokenGrant {
        access_token: Secret::new(parsed.access_token),
        validity,
    })
}
