//! Bounded, deduplicating sliding window of numbers
//!
//! One process-wide window holds the most recently seen distinct numbers,
//! oldest first, capped at a fixed capacity. Each merge appends values not
//! already present, evicting the oldest value whenever the cap is exceeded,
//! and reports the window before and after together with its average.
//!
//! Window lifecycle:
//! 1. Created empty at startup with `Window::new(capacity)`
//! 2. Wrapped in `SharedWindow` and shared by `Arc` into request handlers
//! 3. `SharedWindow::merge()` snapshots and mutates under one lock
//! 4. Never persisted; a restart starts empty again

pub mod error;
pub mod shared;
pub mod window;

pub use error::{Error, Result};
pub use shared::SharedWindow;
pub use window::{Window, WindowUpdate, average};

/// Window capacity when none is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 10;
