//! Authenticated session bootstrap
//!
//! Registers a fresh user against the live backend and makes the client
//! believe it is already logged in.

use tracing::info;

use perkharness_common::storage::TOKEN_KEY;
use perkharness_common::{ApiClient, RegisteredUser, TestCredentials};

use crate::app::ClientApp;
use crate::error::{E2eError, E2eResult};

/// Credential issued by a successful registration
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSession {
    pub token: String,
    pub user: RegisteredUser,
}

/// Single registration call. Any status other than 201 fails the suite with
/// the backend's message; there is no retry.
pub async fn register(api: &ApiClient, credentials: &TestCredentials) -> E2eResult<AuthSession> {
    let response = api
        .register(credentials)
        .await
        .map_err(E2eError::setup("registering the test user"))?;

    info!(user_id = %response.user.id, email = %credentials.email, "Registered test user");

    Ok(AuthSession {
        token: response.token,
        user: response.user,
    })
}

/// Register through an unauthenticated client, then install the token into
/// the app's persisted storage and its HTTP client defaults.
pub async fn bootstrap(app: &ClientApp, credentials: &TestCredentials) -> E2eResult<AuthSession> {
    let anonymous = app.api().detached();
    anonymous.clear_bearer_token();

    let session = register(&anonymous, credentials).await?;
    install(app, &session);
    Ok(session)
}

/// Make `app` behave as `session`'s logged-in user
pub fn install(app: &ClientApp, session: &AuthSession) {
    app.storage().set_item(TOKEN_KEY, session.token.clone());
    app.api().set_bearer_token(session.token.clone());
}
