//! HTTP client for the perks REST API

use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::storage::LocalStorage;
use crate::types::{
    AuthResponse, DeleteAck, ErrorBody, NewPerk, Perk, PerkEnvelope, PerkListEnvelope, PerkPatch,
    TestCredentials,
};
use crate::{Error, Result};

/// Settings every request starts from. Shared between clones so that a
/// token written after a page captured its client is still picked up.
#[derive(Debug, Clone)]
struct Defaults {
    base_url: String,
    bearer: Option<String>,
}

/// Client for the perks API rooted at `base_url` (e.g. `http://127.0.0.1:4100/api`)
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    defaults: Arc<RwLock<Defaults>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            defaults: Arc::new(RwLock::new(Defaults {
                base_url: trim_base(base_url.into()),
                bearer: None,
            })),
        })
    }

    /// Client as the app builds it at startup: token read from storage
    pub fn from_storage(base_url: impl Into<String>, storage: &LocalStorage) -> Result<Self> {
        let client = Self::new(base_url)?;
        if let Some(token) = storage.token() {
            client.set_bearer_token(token);
        }
        Ok(client)
    }

    /// Independent copy with the same base URL and token
    pub fn detached(&self) -> Self {
        let defaults = self.defaults.read().clone();
        Self {
            http: self.http.clone(),
            defaults: Arc::new(RwLock::new(defaults)),
        }
    }

    pub fn base_url(&self) -> String {
        self.defaults.read().base_url.clone()
    }

    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.defaults.write().base_url = trim_base(base_url.into());
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.defaults.read().bearer.clone()
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        self.defaults.write().bearer = Some(token.into());
    }

    pub fn clear_bearer_token(&self) {
        self.defaults.write().bearer = None;
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let defaults = self.defaults.read();
        let url = format!("{}{}", defaults.base_url, path);
        let builder = self.http.request(method, url);
        match &defaults.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn call<B, T>(&self, method: Method, path: &str, body: Option<&B>, expect: StatusCode) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("{} {}", method, path);

        let mut builder = self.request(method.clone(), path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status != expect {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    if text.is_empty() {
                        status.canonical_reason().unwrap_or("no response body").to_string()
                    } else {
                        text
                    }
                });

            return Err(Error::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// GET `/health`; returns the raw status, connection failures as errors
    pub async fn health(&self) -> Result<StatusCode> {
        Ok(self.request(Method::GET, "/health").send().await?.status())
    }

    /// POST `/auth/register`, expecting 201
    pub async fn register(&self, credentials: &TestCredentials) -> Result<AuthResponse> {
        self.call(Method::POST, "/auth/register", Some(credentials), StatusCode::CREATED)
            .await
    }

    /// POST `/perks`, expecting 201
    pub async fn create_perk(&self, perk: &NewPerk) -> Result<Perk> {
        let envelope: PerkEnvelope = self
            .call(Method::POST, "/perks", Some(perk), StatusCode::CREATED)
            .await?;
        Ok(envelope.perk)
    }

    /// GET `/perks`, newest first
    pub async fn list_perks(&self) -> Result<Vec<Perk>> {
        let envelope: PerkListEnvelope = self
            .call::<(), _>(Method::GET, "/perks", None, StatusCode::OK)
            .await?;
        Ok(envelope.perks)
    }

    /// GET `/perks/:id`
    pub async fn get_perk(&self, id: &str) -> Result<Perk> {
        let envelope: PerkEnvelope = self
            .call::<(), _>(Method::GET, &format!("/perks/{id}"), None, StatusCode::OK)
            .await?;
        Ok(envelope.perk)
    }

    /// PATCH `/perks/:id`
    pub async fn update_perk(&self, id: &str, patch: &PerkPatch) -> Result<Perk> {
        let envelope: PerkEnvelope = self
            .call(Method::PATCH, &format!("/perks/{id}"), Some(patch), StatusCode::OK)
            .await?;
        Ok(envelope.perk)
    }

    /// DELETE `/perks/:id`; the backend must acknowledge with `{ok: true}`
    pub async fn delete_perk(&self, id: &str) -> Result<()> {
        let path = format!("/perks/{id}");
        let ack: DeleteAck = self
            .call::<(), _>(Method::DELETE, &path, None, StatusCode::OK)
            .await?;

        if !ack.ok {
            return Err(Error::UnexpectedResponse {
                path,
                reason: "delete was not acknowledged".to_string(),
            });
        }
        Ok(())
    }
}

fn trim_base(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn perk_json(id: &str, title: &str) -> serde_json::Value {
        json!({
            "_id": id,
            "title": title,
            "description": "d",
            "category": "travel",
            "merchant": "Integration Merchant",
            "discountPercent": 15
        })
    }

    #[tokio::test]
    async fn test_register_surfaces_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/register"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "message": "User already exists" })),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/api/", server.uri())).unwrap();
        let err = client
            .register(&TestCredentials::generate("Dup"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("User already exists"));
    }

    #[tokio::test]
    async fn test_token_from_storage_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/perks"))
            .and(header("authorization", "Bearer stored-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "perks": [perk_json("2", "newer"), perk_json("1", "older")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = LocalStorage::new();
        storage.set_item(crate::storage::TOKEN_KEY, "stored-token");

        let client = ApiClient::from_storage(format!("{}/api", server.uri()), &storage).unwrap();
        let perks = client.list_perks().await.unwrap();

        assert_eq!(perks.len(), 2);
        assert_eq!(perks[0].title, "newer");
    }

    #[tokio::test]
    async fn test_clones_share_token_but_detached_does_not() {
        let client = ApiClient::new("http://127.0.0.1:1/api").unwrap();
        let shared = client.clone();
        let detached = client.detached();

        client.set_bearer_token("t1");
        assert_eq!(shared.bearer_token().as_deref(), Some("t1"));
        assert_eq!(detached.bearer_token(), None);
    }

    #[tokio::test]
    async fn test_patch_sends_only_changed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/perks/abc"))
            .and(body_json(json!({ "category": "tech", "discountPercent": 40.0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "perk": perk_json("abc", "t") })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/api", server.uri())).unwrap();
        let patch = PerkPatch {
            category: Some("tech".into()),
            discount_percent: Some(40.0),
            ..Default::default()
        };

        let perk = client.update_perk("abc", &patch).await.unwrap();
        assert_eq!(perk.id, "abc");
    }

    #[tokio::test]
    async fn test_unacknowledged_delete_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/perks/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false })))
            .mount(&server)
            .await;

        let client = ApiClient::new(format!("{}/api", server.uri())).unwrap();
        let err = client.delete_perk("abc").await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_connect_error() {
        let client = ApiClient::new("http://127.0.0.1:1/api").unwrap();
        let err = client.health().await.unwrap_err();
        assert!(err.is_connect());
    }
}
