//! Per-suite context and lifecycle
//!
//! A suite is: register a fresh user, seed one baseline perk, run the test
//! bodies, then tear down everything that was created. The context is an
//! explicit value handed to each body instead of ambient global state.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};

use perkharness_common::{ApiClient, CleanupReport, HarnessEnv, LocalStorage, NewPerk, Perk, TestCredentials};

use crate::app::ClientApp;
use crate::error::E2eResult;
use crate::fixtures::{self, CreatedPerks};
use crate::reaper::{self, UserDirectory};
use crate::session::{self, AuthSession};

/// Everything a test body needs
#[derive(Debug, Clone)]
pub struct SuiteContext {
    pub base_url: String,
    pub credentials: TestCredentials,
    pub session: AuthSession,
    pub seeded_perk: Perk,
    pub app: ClientApp,
    pub created: CreatedPerks,
}

/// Value returned by a suite body together with the teardown report
#[derive(Debug)]
pub struct SuiteOutcome<T> {
    pub value: T,
    pub cleanup: CleanupReport,
}

impl SuiteContext {
    /// Register a generated user and seed the baseline perk
    pub async fn setup(env: &HarnessEnv, users: &dyn UserDirectory) -> E2eResult<Self> {
        Self::setup_with(env, TestCredentials::generate("UI Test User"), users).await
    }

    /// Same as [`SuiteContext::setup`] with caller-chosen credentials. If
    /// seeding fails after registration succeeded, the user is removed
    /// again before the error is returned.
    pub async fn setup_with(
        env: &HarnessEnv,
        credentials: TestCredentials,
        users: &dyn UserDirectory,
    ) -> E2eResult<Self> {
        let app = ClientApp::boot(env.base_url(), LocalStorage::new())?;
        let session = session::bootstrap(&app, &credentials).await?;

        let created = CreatedPerks::new();
        let seeded_perk = match fixtures::seed(app.api(), &created).await {
            Ok(perk) => perk,
            Err(e) => {
                error!("Seeding failed; removing the test user again");
                reaper::cleanup(app.api(), created.drain(), &credentials, users).await;
                app.sign_out();
                return Err(e);
            }
        };

        info!(base_url = %env.base_url(), "Suite ready");

        Ok(Self {
            base_url: env.base_url().to_string(),
            credentials,
            session,
            seeded_perk,
            app,
            created,
        })
    }

    /// The authenticated client pages use
    pub fn api(&self) -> &ApiClient {
        self.app.api()
    }

    /// Create a perk as the suite user and track it for teardown
    pub async fn create_perk(&self, perk: &NewPerk) -> E2eResult<Perk> {
        fixtures::create_tracked(self.api(), &self.created, perk).await
    }

    /// Remove everything the suite created and clear client storage.
    /// Clones share the tracked ids, which are drained here, so a repeat
    /// teardown through a clone only retries the user removal.
    pub async fn teardown(self, users: &dyn UserDirectory) -> CleanupReport {
        let api = self.api().detached();
        api.set_bearer_token(self.session.token.clone());

        let report = reaper::cleanup(&api, self.created.drain(), &self.credentials, users).await;
        self.app.sign_out();
        report
    }

    /// Run `body` and then tear down, whether the body returned normally or
    /// panicked. A panic is re-raised once teardown has finished.
    pub async fn run<F, Fut, T>(self, users: &dyn UserDirectory, body: F) -> SuiteOutcome<T>
    where
        F: FnOnce(SuiteContext) -> Fut,
        Fut: Future<Output = T>,
    {
        let ctx = self.clone();
        let outcome = AssertUnwindSafe(async move { body(ctx).await })
            .catch_unwind()
            .await;

        let cleanup = self.teardown(users).await;

        match outcome {
            Ok(value) => SuiteOutcome { value, cleanup },
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
