//! In-process authentication endpoint for tests

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::http::{StatusCode, header};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// One canned response of the mock auth endpoint.
#[derive(Clone)]
pub(crate) struct MockAuth {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl MockAuth {
    pub(crate) fn granting(token: &str, expires_in: Option<u64>) -> Self {
        let body = match expires_in {
            Some(secs) => serde_json::json!({
                "token_type": "Bearer",
                "access_token": token,
                "expires_in": secs,
            }),
            None => serde_json::json!({ "access_token": token }),
        };
        Self::raw(StatusCode::OK, &body.to_string())
    }

    pub(crate) fn failing(status: StatusCode) -> Self {
        Self::raw(status, r#"{"message":"invalid credentials"}"#)
    }

    pub(crate) fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub(crate) struct MockAuthServer {
    pub url: String,
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<serde_json::Value>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockAuthServer {
    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub(crate) async fn last_body(&self) -> Option<serde_json::Value> {
        self.last_body.lock().await.clone()
    }
}

pub(crate) async fn start_auth_server(response: MockAuth) -> MockAuthServer {
    start_auth_sequence(vec![response]).await
}

/// Serve `responses` in order; the last one repeats once the list runs out.
pub(crate) async fn start_auth_sequence(responses: Vec<MockAuth>) -> MockAuthServer {
    assert!(!responses.is_empty(), "mock auth needs at least one response");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let last_body = Arc::new(Mutex::new(None));
    let responses = Arc::new(responses);

    let app = {
        let hits = hits.clone();
        let last_body = last_body.clone();
        Router::new().route(
            "/auth",
            post(move |Json(body): Json<serde_json::Value>| {
                let hits = hits.clone();
                let last_body = last_body.clone();
                let responses = responses.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    let response = responses[n.min(responses.len() - 1)].clone();
                    *last_body.lock().await = Some(body);
                    if !response.delay.is_zero() {
                        tokio::time::sleep(response.delay).await;
                    }
                    (
                        response.status,
                        [(header::CONTENT_TYPE, "application/json")],
                        response.body,
                    )
                }
            }),
        )
    };

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockAuthServer {
        url: format!("http://{addr}/auth"),
        hits,
        last_body,
        _handle: handle,
    }
}
