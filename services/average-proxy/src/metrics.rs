//! Prometheus metrics exposition
//!
//! - `numbers_requests_total` (counter): labels `status`, `type_code`
//! - `numbers_request_duration_seconds` (histogram): label `status`
//! - `numbers_fetch_errors_total` (counter): label `error_type`
//! - `numbers_window_length` (gauge)
//!
//! `numbers_token_refresh_total{outcome}` is recorded by the token cache
//! itself and rendered through the same recorder.

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_DURATION: &str = "numbers_request_duration_seconds";

/// Bucket boundaries from 1ms up to twice the longest default upstream
/// timeout (auth plus fetch).
const DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 16.0];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The request duration renders as a histogram with `_bucket` lines rather
/// than the default summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed `/numbers` request.
pub fn record_request(status: u16, type_code: &str, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!("numbers_requests_total", "status" => status_str.clone(), "type_code" => type_code.to_string())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION, "status" => status_str).record(duration_secs);
}

/// Record a failed upstream fetch with a classification label.
pub fn record_fetch_error(error_type: &str) {
    metrics::counter!("numbers_fetch_errors_total", "error_type" => error_type.to_string())
        .increment(1);
}

pub fn set_window_length(len: usize) {
    metrics::gauge!("numbers_window_length").set(len as f64);
}
