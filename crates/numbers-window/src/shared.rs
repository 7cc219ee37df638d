//! Process-wide window guarded by an async mutex
//!
//! Snapshot and mutation happen in one critical section, so two concurrent
//! merges never interleave their read-modify-write.

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::window::{Window, WindowUpdate};

pub struct SharedWindow {
    inner: Mutex<Window>,
    capacity: usize,
}

impl SharedWindow {
    pub fn new(capacity: usize) -> Result<Self> {
        let window = Window::new(capacity)?;
        Ok(Self {
            inner: Mutex::new(window),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Atomically snapshot, merge `numbers`, and report the update.
    pub async fn merge(&self, numbers: Vec<i64>) -> WindowUpdate {
        let mut window = self.inner.lock().await;
        let update = window.merge(numbers);
        debug!(
            offered = update.numbers.len(),
            len = update.curr_state.len(),
            avg = update.avg,
            "window merged"
        );
        update
    }

    pub async fn snapshot(&self) -> Vec<i64> {
        self.inner.lock().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
