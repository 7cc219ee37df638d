//! Average Calculator Proxy
//!
//! Single-binary Rust service that:
//! 1. Holds a bearer token for the evaluation service, refreshed on demand
//! 2. Fetches numbers by type code (`p`, `f`, `e`, `r`) from the upstream
//! 3. Merges them into a bounded, deduplicated window
//! 4. Reports the window before and after the merge with its average

mod config;
mod error;
mod handler;
mod metrics;
mod service;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use numbers_auth::TokenCache;
use numbers_upstream::UpstreamClient;
use numbers_window::SharedWindow;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handler::NumbersState;
use crate::service::{ServiceAction, ServiceEvent, ServiceMetrics, ServiceState, handle_event};

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    numbers: NumbersState,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

/// Assemble the token cache, upstream client and window from config.
fn build_state(
    config: &Config,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
) -> error::Result<AppState> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| error::Error::HttpClient(e.to_string()))?;

    let tokens = Arc::new(TokenCache::new(
        client.clone(),
        config.auth_url()?,
        config.identity()?,
        config.auth_timeout(),
    ));
    let upstream = UpstreamClient::new(client, config.registry()?, tokens, config.fetch_timeout());
    let window = Arc::new(SharedWindow::new(config.window.size)?);

    Ok(AppState {
        numbers: NumbersState {
            upstream,
            window,
            policy: config.error_policy(),
            requests_total: metrics.requests_total.clone(),
            errors_total: metrics.errors_total.clone(),
            in_flight: metrics.in_flight.clone(),
        },
        metrics,
        prometheus,
    })
}

/// Build the axum router with all routes and shared state.
///
/// Requests beyond `max_connections` queue at the concurrency limit layer.
fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/numbers/{type_code}", get(numbers_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // JSON output, filter from LOG_LEVEL then RUST_LOG
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting average-proxy");

    // Must be installed before any metric is emitted
    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    let state = ServiceState::Initializing;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loading configuration"),
        None => info!("no config file, using environment only"),
    }

    let config = match Config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _ = handle_event(state, ServiceEvent::StartupFailed(e.to_string()));
            return Err(e).context("failed to load configuration");
        }
    };

    info!(
        listen_addr = %config.server.listen_addr,
        window_size = config.window.size,
        strict_fetch_errors = config.upstream.strict_fetch_errors,
        "configuration loaded"
    );

    // Transition: Initializing -> Starting
    let (state, action) = handle_event(
        state,
        ServiceEvent::ConfigLoaded {
            listen_addr: config.server.listen_addr,
        },
    );
    let listen_addr = match action {
        ServiceAction::StartListener { addr } => addr,
        _ => anyhow::bail!("unexpected action after ConfigLoaded: {action:?}"),
    };

    let service_metrics = ServiceMetrics::new();
    let app_state = build_state(&config, service_metrics.clone(), prometheus_handle)
        .context("failed to assemble service state")?;
    let app = build_router(app_state, config.server.max_connections);

    let listener = match TcpListener::bind(listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            let _ = handle_event(state, ServiceEvent::StartupFailed(e.to_string()));
            return Err(e).with_context(|| format!("failed to bind to {listen_addr}"));
        }
    };

    // Transition: Starting -> Running
    let (state, _) = handle_event(state, ServiceEvent::ListenerReady);
    info!(addr = %listen_addr, "state: Running, accepting requests");

    let in_flight = service_metrics.in_flight.clone();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;

    // Transition: Running -> Draining. The drain deadline counts from signal
    // receipt, not from server start.
    let (state, action) = handle_event(state, ServiceEvent::ShutdownSignal);
    let deadline = match action {
        ServiceAction::Drain { deadline } => deadline,
        _ => anyhow::bail!("unexpected action after ShutdownSignal: {action:?}"),
    };
    let _ = shutdown_tx.send(());

    let deadline = tokio::time::Instant::from_std(deadline);
    let event = match tokio::time::timeout_at(deadline, server_handle).await {
        Ok(Ok(Ok(()))) => {
            info!("all in-flight requests drained");
            ServiceEvent::Drained
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "server error during shutdown");
            ServiceEvent::Drained
        }
        Ok(Err(e)) => {
            error!(error = %e, "server task panicked");
            ServiceEvent::Drained
        }
        Err(_) => {
            warn!(
                remaining = in_flight.load(Ordering::Relaxed),
                drain_timeout_secs = service::DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            );
            ServiceEvent::DrainTimeout
        }
    };

    let (_state, action) = handle_event(state, event);
    info!(?action, "shutdown complete");
    Ok(())
}

async fn numbers_handler(State(state): State<AppState>, Path(type_code): Path<String>) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    handler::numbers_request(&state.numbers, &type_code, request_id).await
}

/// Liveness plus a summary of token and window state.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
        "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
        "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
        "token_held": state.numbers.upstream.tokens().is_held().await,
        "window_len": state.numbers.window.len().await,
        "window_size": state.numbers.window.capacity(),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
