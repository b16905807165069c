//! Shared setup for the integration suites: tracing and an in-process
//! stub backend per test.
#![allow(dead_code)]

use std::sync::LazyLock;
use tracing_subscriber::EnvFilter;

use perkharness_common::env::{MONGO_URI, TEST_BASE_URL};
use perkharness_common::{EnvLoader, HarnessEnv, NewPerk};
use perkharness_e2e::{StubServer, StubState, SuiteContext};

// Ensure that the `tracing` stack is only initialised once using `LazyLock`
static TRACING: LazyLock<()> = LazyLock::new(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("TEST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init();
    }
});

pub fn init_tracing() {
    LazyLock::force(&TRACING);
}

pub struct TestBackend {
    pub server: StubServer,
    pub env: HarnessEnv,
}

impl TestBackend {
    pub fn users(&self) -> &StubState {
        self.server.state()
    }

    /// Registered user plus the seeded perk
    pub async fn suite(&self) -> SuiteContext {
        SuiteContext::setup(&self.env, self.users())
            .await
            .expect("Failed to set up the suite.")
    }
}

pub async fn spawn_backend() -> TestBackend {
    init_tracing();

    let server = StubServer::spawn(0)
        .await
        .expect("Failed to start the stub backend.");

    let env = EnvLoader::from_vars([
        (MONGO_URI.to_string(), "mongodb://127.0.0.1:27017/perks-test".to_string()),
        (TEST_BASE_URL.to_string(), server.api_base_url()),
    ])
    .load()
    .expect("Failed to resolve the harness environment.");

    TestBackend { server, env }
}

pub fn perk(title: impl Into<String>) -> NewPerk {
    NewPerk {
        title: title.into(),
        description: "Integration test record.".to_string(),
        category: "food".to_string(),
        merchant: "Test Merchant".to_string(),
        discount_percent: 25.0,
    }
}

/// A title that cannot collide with earlier runs
pub fn unique(label: &str) -> String {
    format!("{} {}", label, uuid::Uuid::new_v4().simple())
}
