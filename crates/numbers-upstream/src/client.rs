//! Single-attempt fetch of a numeric sequence
//!
//! One bearer-authenticated GET per call with a bounded timeout, no retries.
//! The numbers are returned exactly as the upstream sent them, duplicates and
//! ordering included.

use std::sync::Arc;
use std::time::Duration;

use numbers_auth::TokenCache;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::registry::UpstreamTypeRegistry;
use crate::{FetchError, Result};

#[derive(Debug, Deserialize)]
struct NumbersResponse {
    #[serde(default)]
    numbers: Vec<i64>,
}

/// Fetches numbers for a type code using the shared `TokenCache`.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    registry: UpstreamTypeRegistry,
    tokens: Arc<TokenCache>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(
        client: reqwest::Client,
        registry: UpstreamTypeRegistry,
        tokens: Arc<TokenCache>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            registry,
            tokens,
            timeout,
        }
    }

    pub fn tokens(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Fetch numbers, reporting why nothing was fetched on failure.
    ///
    /// Unknown codes are rejected before a token is requested.
    #[instrument(skip(self))]
    pub async fn try_fetch(&self, type_code: &str) -> Result<Vec<i64>> {
        let (code, endpoint) = self.registry.resolve(type_code)?;
        let token = self.tokens.ensure_valid_token().await?;

        let response = self
            .client
            .get(endpoint)
            .header(AUTHORIZATION, format!("Bearer {}", token.expose()))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(self.timeout)
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Transport(e.to_string())
            }
        })?;
        let parsed: NumbersResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!(type_code = %code, count = parsed.numbers.len(), "numbers fetched");
        Ok(parsed.numbers)
    }

    /// Fetch numbers; any failure yields an empty sequence.
    pub async fn fetch_numbers(&self, type_code: &str) -> Vec<i64> {
        self.try_fetch(type_code).await.unwrap_or_else(|e| {
            warn!(type_code, error = %e, "fetch failed, returning no numbers");
            Vec::new()
        })
    }
}
