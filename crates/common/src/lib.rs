//! Shared types for the average proxy workspace
//!
//! `Secret` keeps bearer tokens and identity secrets out of logs; `Error` is
//! the configuration-time error used while loading the service config.

mod secret;
mod error;

pub use secret::Secret;
pub use error::{Error, Result};
