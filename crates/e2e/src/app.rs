//! The client under test: its persisted storage and the API client its
//! pages use

use perkharness_common::{ApiClient, LocalStorage};

use crate::error::E2eResult;

/// Client-side runtime shared by every rendered page
#[derive(Debug, Clone)]
pub struct ClientApp {
    storage: LocalStorage,
    api: ApiClient,
}

impl ClientApp {
    /// Boot the client the way the browser app does: the API client is
    /// created against `base_url` and picks up whatever token is already
    /// persisted in `storage`.
    pub fn boot(base_url: &str, storage: LocalStorage) -> E2eResult<Self> {
        let api = ApiClient::from_storage(base_url, &storage)?;
        Ok(Self { storage, api })
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Forget the session, as logging out does
    pub fn sign_out(&self) {
        self.storage.clear();
        self.api.clear_bearer_token();
    }
}
