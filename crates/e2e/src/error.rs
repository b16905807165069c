//! Error types for E2E runs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Backend failed to start: {0}")]
    ServerStartup(String),

    #[error("Timed out waiting for the backend at {url} to become ready ({attempts} attempts, last: {last})")]
    ReadinessTimeout {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Backend process exited before the health check succeeded ({status})")]
    PrematureExit { status: String },

    #[error("Suite setup failed while {stage}: {source}")]
    Setup {
        stage: &'static str,
        #[source]
        source: perkharness_common::Error,
    },

    #[error("Timed out after {attempts} attempts waiting for {expected}")]
    AssertionTimeout { expected: String, attempts: u32 },

    #[error("No element matches {0}")]
    ElementNotFound(String),

    #[error("No route matches {0}")]
    NoRoute(String),

    #[error("Test runner failed to start: {0}")]
    TestRunnerSpawn(String),

    #[error("User store error: {0}")]
    UserStore(String),

    #[error(transparent)]
    Common(#[from] perkharness_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Wrap a failed setup call with the step it belonged to
    pub fn setup(stage: &'static str) -> impl FnOnce(perkharness_common::Error) -> Self {
        move |source| E2eError::Setup { stage, source }
    }
}

impl From<mongodb::error::Error> for E2eError {
    fn from(e: mongodb::error::Error) -> Self {
        E2eError::UserStore(e.to_string())
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
