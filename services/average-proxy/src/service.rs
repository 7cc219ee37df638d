//! Service state machine
//!
//! Pure state machine: receives events, returns (new_state, action).
//! Caller (main.rs) executes the I/O implied by each action.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

/// Runtime counters tracked while the service is running
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    /// Requests currently being processed; reported when the drain deadline
    /// expires with work still pending
    pub in_flight: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Lifecycle states.
///
/// Variant data is carried for logging and tests; `main` only moves it
/// between transitions.
#[derive(Debug, PartialEq)]
#[allow(dead_code)]
pub enum ServiceState {
    /// Loading config, building the token cache, client and window
    Initializing,
    /// Binding the HTTP listener
    Starting { listen_addr: SocketAddr },
    /// Serving `/numbers`, `/health` and `/metrics`
    Running { listen_addr: SocketAddr },
    /// Graceful shutdown, finishing in-flight requests
    Draining { deadline: Instant },
    /// Terminal state
    Stopped { exit_code: i32 },
}

#[derive(Debug)]
#[allow(dead_code)]
pub enum ServiceEvent {
    /// Configuration parsed and validated
    ConfigLoaded { listen_addr: SocketAddr },
    /// Configuration or state assembly failed
    StartupFailed(String),
    /// HTTP listener bound and ready
    ListenerReady,
    /// SIGTERM/SIGINT received
    ShutdownSignal,
    /// Every in-flight request finished
    Drained,
    /// Drain deadline exceeded
    DrainTimeout,
}

/// Actions the caller should execute after a state transition
#[derive(Debug, PartialEq)]
pub enum ServiceAction {
    /// Bind HTTP listener on the given address
    StartListener { addr: SocketAddr },
    /// Stop accepting and wait for in-flight requests until `deadline`
    Drain { deadline: Instant },
    /// Exit the process
    Shutdown { exit_code: i32 },
    /// No-op
    None,
}

/// Graceful shutdown budget, counted from signal receipt
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle a state transition. Pure function: no I/O.
pub fn handle_event(state: ServiceState, event: ServiceEvent) -> (ServiceState, ServiceAction) {
    match (state, event) {
        (ServiceState::Initializing, ServiceEvent::ConfigLoaded { listen_addr }) => (
            ServiceState::Starting { listen_addr },
            ServiceAction::StartListener { addr: listen_addr },
        ),

        (ServiceState::Initializing | ServiceState::Starting { .. }, ServiceEvent::StartupFailed(_)) => (
            ServiceState::Stopped { exit_code: 1 },
            ServiceAction::Shutdown { exit_code: 1 },
        ),

        (ServiceState::Starting { listen_addr }, ServiceEvent::ListenerReady) => {
            (ServiceState::Running { listen_addr }, ServiceAction::None)
        }

        (ServiceState::Running { .. }, ServiceEvent::ShutdownSignal) => {
            let deadline = Instant::now() + DRAIN_TIMEOUT;
            (
                ServiceState::Draining { deadline },
                ServiceAction::Drain { deadline },
            )
        }

        (ServiceState::Draining { .. }, ServiceEvent::Drained | ServiceEvent::DrainTimeout) => (
            ServiceState::Stopped { exit_code: 0 },
            ServiceAction::Shutdown { exit_code: 0 },
        ),

        // Nothing to drain before the listener is up
        (ServiceState::Initializing | ServiceState::Starting { .. }, ServiceEvent::ShutdownSignal) => (
            ServiceState::Stopped { exit_code: 0 },
            ServiceAction::Shutdown { exit_code: 0 },
        ),

        // Invalid/unhandled transition: stay in current state
        (state, _event) => (state, ServiceAction::None),
    }
}
