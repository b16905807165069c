//! Perkharness Common Library
//!
//! Shared pieces of the perks end-to-end harness: backend wire types, the
//! harness environment loader, the REST client used both by setup code and
//! by rendered pages, bounded polling and best-effort cleanup.

pub mod cleanup;
pub mod client;
pub mod env;
pub mod error;
pub mod poll;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use cleanup::{attempt_all, CleanupFailure, CleanupReport};
pub use client::ApiClient;
pub use env::{EnvLoader, HarnessEnv};
pub use error::{Error, Result};
pub use poll::{Poll, PollError, Probe};
pub use storage::LocalStorage;
pub use types::*;

/// Perkharness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// API prefix the backend mounts its routes under
pub const API_PREFIX: &str = "/api";

/// API base URL for a backend origin such as `http://127.0.0.1:4100`
pub fn api_base_url(origin: &str) -> String {
    format!("{}{}", origin.trim_end_matches('/'), API_PREFIX)
}
