//! Bearer credential cache with lazy, single-flight refresh
//!
//! Two locks with distinct roles. `refresh` is the single-flight guard: it is
//! held across the auth request, so concurrent callers that find the slot
//! empty or expired queue behind the caller already refreshing instead of each
//! hitting the auth endpoint. `slot` holds the credential and is only taken
//! for brief reads and writes, never across network I/O, so `is_held` and
//! `current` answer immediately while a refresh is in flight. A refresh
//! generation counter lets queued callers tell that a refresh completed while
//! they waited: on success they pick up the fresh credential, on failure they
//! get the same error without issuing a second request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use common::Secret;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::token::{self, TokenGrant};

/// A granted bearer token with its absolute expiry.
///
/// Replaced wholesale on every refresh.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: Secret<String>,
    pub expires_at: Instant,
    /// Effective validity granted at refresh time (after clamping)
    pub validity: Duration,
}

impl Credential {
    fn from_grant(grant: TokenGrant, now: Instant) -> Self {
        Self {
            token: grant.access_token,
            expires_at: now + grant.validity,
            validity: grant.validity,
        }
    }

    /// Usable iff `now < expires_at`.
    pub fn is_usable(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Slot {
    credential: Option<Credential>,
    /// Error from the most recent refresh, shared with callers that waited on it
    last_failure: Option<Error>,
}

/// Process-wide holder of the upstream bearer credential.
pub struct TokenCache {
    client: reqwest::Client,
    auth_url: String,
    identity: Identity,
    timeout: Duration,
    slot: RwLock<Slot>,
    refresh: Mutex<()>,
    refreshes: AtomicU64,
}

impl TokenCache {
    pub fn new(
        client: reqwest::Client,
        auth_url: impl Into<String>,
        identity: Identity,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            auth_url: auth_url.into(),
            identity,
            timeout,
            slot: RwLock::new(Slot::default()),
            refresh: Mutex::new(()),
            refreshes: AtomicU64::new(0),
        }
    }

    async fn usable_token(&self) -> Option<Secret<String>> {
        self.slot
            .read()
            .await
            .credential
            .as_ref()
            .filter(|c| c.is_usable(Instant::now()))
            .map(|c| c.token.clone())
    }

    /// Return a usable bearer token, refreshing it first if absent or expired.
    ///
    /// On refresh failure the slot is cleared and the error returned; nothing
    /// stale is ever handed out.
    pub async fn ensure_valid_token(&self) -> Result<Secret<String>> {
        let observed = self.refreshes.load(Ordering::Acquire);
        if let Some(token) = self.usable_token().await {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while we queued on the guard
        if let Some(token) = self.usable_token().await {
            return Ok(token);
        }
        if self.refreshes.load(Ordering::Acquire) != observed {
            if let Some(err) = &self.slot.read().await.last_failure {
                debug!(error = %err, "sharing outcome of in-flight refresh");
                return Err(Error::Unavailable(err.to_string()));
            }
        }

        let outcome =
            token::request_token(&self.client, &self.auth_url, &self.identity, self.timeout).await;

        let mut slot = self.slot.write().await;
        self.refreshes.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(grant) => {
                let credential = Credential::from_grant(grant, Instant::now());
                let token = credential.token.clone();
                info!(
                    validity_ms = credential.validity.as_millis() as u64,
                    "token refreshed"
                );
                metrics::counter!("numbers_token_refresh_total", "outcome" => "success")
                    .increment(1);
                slot.credential = Some(credential);
                slot.last_failure = None;
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing credential");
                metrics::counter!("numbers_token_refresh_total", "outcome" => e.kind())
                    .increment(1);
                slot.credential = None;
                slot.last_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Whether a credential is held at all, expired or not.
    ///
    /// The request handler uses this to tell "authentication failed" apart
    /// from "fetched nothing". Never waits on an in-flight refresh.
    pub async fn is_held(&self) -> bool {
        self.slot.read().await.credential.is_some()
    }

    /// Clone of the current credential, if any.
    pub async fn current(&self) -> Option<Credential> {
        self.slot.read().await.credential.clone()
    }

    /// Number of refresh attempts made so far, successful or not.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test_identity;
    use crate::mock::{MockAuth, start_auth_sequence, start_auth_server};
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn cache_for(url: &str) -> TokenCache {
        TokenCache::new(
            reqwest::Client::new(),
            url,
            test_identity(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn starts_without_credential() {
        let cache = cache_for("http://127.0.0.1:1/auth");
        assert!(!cache.is_held().await);
        assert!(cache.current().await.is_none());
        assert_eq!(cache.refresh_count(), 0);
    }

    #[tokio::test]
    async fn reuses_token_within_validity() {
        let mock = start_auth_server(MockAuth::granting("at_1", Some(60))).await;
        let cache = cache_for(&mock.url);

        let first = cache.ensure_valid_token().await.unwrap();
        let second = cache.ensure_valid_token().await.unwrap();

        assert_eq!(first.expose(), "at_1");
        assert_eq!(second.expose(), "at_1");
        assert_eq!(mock.hits(), 1, "second call must not hit the auth endpoint");
        assert!(cache.is_held().await);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let mock = start_auth_sequence(vec![
            MockAuth::granting("at_1", Some(0)),
            MockAuth::granting("at_2", Some(60)),
        ])
        .await;
        let cache = cache_for(&mock.url);

        assert_eq!(cache.ensure_valid_token().await.unwrap().expose(), "at_1");
        assert_eq!(cache.ensure_valid_token().await.unwrap().expose(), "at_2");
        assert_eq!(mock.hits(), 2);
    }

    #[tokio::test]
    async fn excessive_validity_is_clamped() {
        let mock = start_auth_server(MockAuth::granting("at_long", Some(7200))).await;
        let cache = cache_for(&mock.url);

        cache.ensure_valid_token().await.unwrap();

        let credential = cache.current().await.unwrap();
        assert_eq!(credential.validity, Duration::from_secs(300));
        let remaining = credential.expires_at - Instant::now();
        assert!(remaining <= Duration::from_secs(300), "got: {remaining:?}");
        assert!(remaining > Duration::from_secs(290), "got: {remaining:?}");
    }

    #[tokio::test]
    async fn failed_refresh_clears_credential() {
        let mock = start_auth_sequence(vec![
            MockAuth::granting("at_1", Some(0)),
            MockAuth::failing(StatusCode::INTERNAL_SERVER_ERROR),
        ])
        .await;
        let cache = cache_for(&mock.url);

        cache.ensure_valid_token().await.unwrap();
        assert!(cache.is_held().await);

        let err = cache.ensure_valid_token().await.unwrap_err();
        assert!(matches!(err, Error::Rejected { status: 500, .. }), "got: {err:?}");
        assert!(!cache.is_held().await, "stale credential must not survive a failed refresh");
    }

    #[tokio::test]
    async fn recovers_after_failure() {
        let mock = start_auth_sequence(vec![
            MockAuth::failing(StatusCode::UNAUTHORIZED),
            MockAuth::granting("at_ok", Some(60)),
        ])
        .await;
        let cache = cache_for(&mock.url);

        assert!(cache.ensure_valid_token().await.is_err());
        assert_eq!(cache.ensure_valid_token().await.unwrap().expose(), "at_ok");
        assert_eq!(mock.hits(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let mock = start_auth_server(
            MockAuth::granting("at_shared", Some(60)).with_delay(Duration::from_millis(100)),
        )
        .await;
        let cache = Arc::new(cache_for(&mock.url));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.ensure_valid_token().await }));
        }
        for task in tasks {
            let token = task.await.unwrap().unwrap();
            assert_eq!(token.expose(), "at_shared");
        }

        assert_eq!(mock.hits(), 1, "refresh must be single-flight");
        assert_eq!(cache.refresh_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_a_failed_refresh() {
        let mock = start_auth_server(
            MockAuth::failing(StatusCode::SERVICE_UNAVAILABLE)
                .with_delay(Duration::from_millis(100)),
        )
        .await;
        let cache = Arc::new(cache_for(&mock.url));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move { cache.ensure_valid_token().await }));
        }
        for task in tasks {
            assert!(task.await.unwrap().is_err());
        }

        assert_eq!(mock.hits(), 1, "waiters must not retry a refresh that just failed");
        assert!(!cache.is_held().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn state_queries_do_not_wait_on_refresh() {
        let mock = start_auth_sequence(vec![
            MockAuth::granting("at_1", Some(0)),
            MockAuth::granting("at_2", Some(60)).with_delay(Duration::from_millis(1500)),
        ])
        .await;
        let cache = Arc::new(cache_for(&mock.url));
        cache.ensure_valid_token().await.unwrap();

        let refreshing = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.ensure_valid_token().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        let held = tokio::time::timeout(Duration::from_millis(250), cache.is_held())
            .await
            .expect("is_held must not block behind the refresh request");
        let current = tokio::time::timeout(Duration::from_millis(250), cache.current())
            .await
            .expect("current must not block behind the refresh request");
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(held, "expired credential is still held until the refresh lands");
        assert_eq!(current.unwrap().token.expose(), "at_1");

        assert_eq!(refreshing.await.unwrap().unwrap().expose(), "at_2");
        assert_eq!(cache.current().await.unwrap().token.expose(), "at_2");
        assert_eq!(mock.hits(), 2);
    }

    #[test]
    fn credential_usable_strictly_before_expiry() {
        let now = Instant::now();
        let credential = Credential {
            token: Secret::new("t".into()),
            expires_at: now + Duration::from_secs(1),
            validity: Duration::from_secs(1),
        };
        assert!(credential.is_usable(now));
        assert!(!credential.is_usable(now + Duration::from_secs(1)));
    }
}
