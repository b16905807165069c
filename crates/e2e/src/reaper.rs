//! Teardown of everything a suite created in the shared live store

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::Client;
use tracing::{info, warn};

use perkharness_common::{attempt_all, ApiClient, CleanupReport, TestCredentials};

use crate::error::E2eResult;

/// Direct access to the user records behind the API. The REST surface has
/// no user-deletion route, so test users are removed at the persistence
/// layer.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Delete the user with exactly this (already normalized) email.
    /// Returns the number of records removed.
    async fn remove_user_by_email(&self, email: &str) -> E2eResult<u64>;
}

/// [`UserDirectory`] backed by the app's MongoDB `users` collection
#[derive(Debug, Clone)]
pub struct MongoUserDirectory {
    client: Client,
    database: String,
}

impl MongoUserDirectory {
    /// Connect using `MONGO_URI`; the database named in the URI is used,
    /// falling back to `test` like the Node driver does.
    pub async fn connect(uri: &str) -> E2eResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let database = client
            .default_database()
            .map(|db| db.name().to_string())
            .unwrap_or_else(|| "test".to_string());

        Ok(Self { client, database })
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn remove_user_by_email(&self, email: &str) -> E2eResult<u64> {
        let result = self
            .client
            .database(&self.database)
            .collection::<Document>("users")
            .delete_one(doc! { "email": email }, None)
            .await?;

        Ok(result.deleted_count)
    }
}

/// Delete every tracked perk, then the test user.
///
/// Perk deletions run concurrently through a client authenticated as the
/// suite's user; a failing deletion is recorded and the rest still run. The
/// user is removed by lower-cased email directly through `users`. Nothing
/// here returns an error: the report says what could not be removed.
pub async fn cleanup(
    api: &ApiClient,
    ids: Vec<String>,
    credentials: &TestCredentials,
    users: &dyn UserDirectory,
) -> CleanupReport {
    let mut report = attempt_all(ids, |id| {
        let api = api.clone();
        async move { api.delete_perk(&id).await }
    })
    .await;

    let email = credentials.normalized_email();
    let outcome = match users.remove_user_by_email(&email).await {
        Ok(0) => {
            warn!(email = %email, "Test user was already gone");
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => Err(e),
    };
    report.record(email, outcome);

    if report.is_clean() {
        info!("Teardown removed {} record(s)", report.attempted);
    } else {
        warn!(
            "Teardown left {} of {} record(s) behind",
            report.failures.len(),
            report.attempted
        );
    }
    report
}

