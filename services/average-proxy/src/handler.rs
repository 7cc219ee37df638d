//! `/numbers/{typeCode}` request handling
//!
//! One fetch, one classification, then at most one atomic window merge. The
//! response body is the merge result verbatim, or a fixed error object when
//! authentication failed (or, in strict mode, the upstream failed).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use numbers_upstream::{
    ErrorPolicy, FetchDisposition, FetchError, TypeCode, UpstreamClient, classify_fetch,
};
use numbers_window::SharedWindow;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics;

pub const AUTH_FAILURE_MESSAGE: &str = "Failed to authenticate with the server";
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to fetch numbers from upstream";

/// Shared state passed to the numbers handler via axum State extractor
#[derive(Clone)]
pub struct NumbersState {
    pub upstream: UpstreamClient,
    pub window: Arc<SharedWindow>,
    pub policy: ErrorPolicy,
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
}

/// Decrements `in_flight` when the request finishes, however it finishes.
struct InFlight<'a>(&'a AtomicU64);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicU64) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// JSON error body: `{"error": "..."}`
pub fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// Fetch numbers for `type_code`, merge them into the shared window and
/// report the before/after state.
#[instrument(skip_all, fields(request_id = %request_id, type_code = %type_code))]
pub async fn numbers_request(state: &NumbersState, type_code: &str, request_id: String) -> Response {
    let _in_flight = InFlight::enter(&state.in_flight);
    state.requests_total.fetch_add(1, Ordering::Relaxed);
    let started = Instant::now();

    let result = state.upstream.try_fetch(type_code).await;
    match &result {
        Ok(numbers) => debug!(count = numbers.len(), "fetched numbers"),
        Err(FetchError::UnknownType(_)) => info!("unknown type code, window left unchanged"),
        Err(e) => {
            warn!(error = %e, error_type = e.kind(), "fetch failed");
            metrics::record_fetch_error(e.kind());
        }
    }

    // Re-checked after the fetch: a refresh may have cleared the slot
    let token_held = state.upstream.tokens().is_held().await;

    let response = match classify_fetch(result, token_held, state.policy) {
        FetchDisposition::Merge(numbers) => {
            let update = state.window.merge(numbers).await;
            metrics::set_window_length(update.curr_state.len());
            (StatusCode::OK, Json(update)).into_response()
        }
        FetchDisposition::AuthFailure => {
            state.errors_total.fetch_add(1, Ordering::Relaxed);
            error!("no token held and nothing fetched");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, AUTH_FAILURE_MESSAGE)
        }
        FetchDisposition::UpstreamFailure(e) => {
            state.errors_total.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "upstream failure surfaced to caller");
            error_response(StatusCode::BAD_GATEWAY, UPSTREAM_FAILURE_MESSAGE)
        }
    };

    // Arbitrary path segments must not become label values
    let label = TypeCode::parse(type_code).map_or("unknown", |code| code.as_str());
    metrics::record_request(
        response.status().as_u16(),
        label,
        started.elapsed().as_secs_f64(),
    );
    response
}
