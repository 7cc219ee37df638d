//! In-process auth + numbers endpoints for tests

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use common::Secret;
use numbers_auth::Identity;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::registry::TypeCode;

const MOCK_TOKEN: &str = "mock-token";

pub(crate) fn identity() -> Identity {
    Identity {
        email: "student@example.edu".into(),
        name: "Test Student".into(),
        roll_no: "21CS1001".into(),
        access_code: Secret::new("AbCdEf".into()),
        client_id: "client-123".into(),
        client_secret: Secret::new("s3cr3t".into()),
    }
}

#[derive(Default)]
struct MockState {
    auth_hits: AtomicUsize,
    numbers_hits: AtomicUsize,
    auth_failure: Mutex<Option<StatusCode>>,
    responses: Mutex<HashMap<String, (StatusCode, String)>>,
    delay: Mutex<Duration>,
    last_authorization: Mutex<Option<String>>,
}

pub(crate) struct MockUpstream {
    base: String,
    state: Arc<MockState>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    pub(crate) fn auth_url(&self) -> String {
        format!("{}/auth", self.base)
    }

    pub(crate) fn numbers_url(&self, code: TypeCode) -> String {
        format!("{}/upstream/{}", self.base, code.as_str())
    }

    pub(crate) fn auth_hits(&self) -> usize {
        self.state.auth_hits.load(Ordering::SeqCst)
    }

    pub(crate) fn numbers_hits(&self) -> usize {
        self.state.numbers_hits.load(Ordering::SeqCst)
    }

    pub(crate) async fn set_numbers(&self, code: TypeCode, status: StatusCode, body: &str) {
        self.state
            .responses
            .lock()
            .await
            .insert(code.as_str().to_string(), (status, body.to_string()));
    }

    pub(crate) async fn fail_auth(&self, status: StatusCode) {
        *self.state.auth_failure.lock().await = Some(status);
    }

    pub(crate) async fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().await = delay;
    }

    pub(crate) async fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().await.clone()
    }
}

async fn auth_handler(State(state): State<Arc<MockState>>) -> (StatusCode, String) {
    state.auth_hits.fetch_add(1, Ordering::SeqCst);
    match *state.auth_failure.lock().await {
        Some(status) => (status, r#"{"message":"invalid credentials"}"#.to_string()),
        None => (
            StatusCode::CREATED,
            serde_json::json!({ "access_token": MOCK_TOKEN, "expires_in": 300 }).to_string(),
        ),
    }
}

async fn numbers_handler(
    State(state): State<Arc<MockState>>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    state.numbers_hits.fetch_add(1, Ordering::SeqCst);
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_authorization.lock().await = authorization.clone();

    let delay = *state.delay.lock().await;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let json = [(header::CONTENT_TYPE, "application/json")];
    let expected = format!("Bearer {MOCK_TOKEN}");
    if authorization.as_deref() != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, json, "unauthorized".to_string());
    }

    match state.responses.lock().await.get(&code) {
        Some((status, body)) => (*status, json, body.clone()),
        None => (StatusCode::OK, json, r#"{"numbers":[1,2,3]}"#.to_string()),
    }
}

pub(crate) async fn start_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(MockState::default());

    let app = Router::new()
        .route("/auth", post(auth_handler))
        .route("/upstream/{code}", get(numbers_handler))
        .with_state(state.clone());

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base: format!("http://{addr}"),
        state,
        _handle: handle,
    }
}
