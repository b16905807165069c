//! Error types shared by the harness crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the harness Error
pub type Result<T> = std::result::Result<T, Error>;

/// Harness error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing required configuration {var}: {hint}")]
    MissingConfig { var: &'static str, hint: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read environment file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {path} returned {status}: {message}")]
    Api {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {path}: {reason}")]
    UnexpectedResponse { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status of a rejected API call, if this error is one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the backend could not be reached at all
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Http(e) if e.is_connect())
    }
}
