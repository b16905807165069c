//! In-memory perks backend
//!
//! Serves the same REST contract as the real backend under `/api` so the
//! harness can be exercised end to end without a database. Tokens are opaque
//! uuids; perks are visible to everyone by id but listed, changed and
//! deleted only by their creator.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use perkharness_common::{api_base_url, Perk, PerkPatch, RegisteredUser, API_PREFIX};

use crate::error::E2eResult;
use crate::reaper::UserDirectory;

#[derive(Debug, Clone)]
struct StoredUser {
    id: String,
    name: String,
    email: String,
}

#[derive(Debug, Default)]
struct Store {
    /// Keyed by normalized email
    users: HashMap<String, StoredUser>,
    /// Token to user id
    tokens: HashMap<String, String>,
    /// Perk plus insertion sequence, for newest-first listing
    perks: HashMap<String, (u64, Perk)>,
    sequence: u64,
}

/// Shared backend state; clones see the same store
#[derive(Debug, Clone, Default)]
pub struct StubState {
    store: Arc<RwLock<Store>>,
}

impl StubState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.store.read().users.len()
    }

    pub fn has_user(&self, email: &str) -> bool {
        self.store.read().users.contains_key(&email.trim().to_lowercase())
    }

    pub fn perk_count(&self) -> usize {
        self.store.read().perks.len()
    }

    pub fn has_perk(&self, id: &str) -> bool {
        self.store.read().perks.contains_key(id)
    }

    fn authenticate(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Not authorized, no token"))?;

        self.store
            .read()
            .tokens
            .get(token.trim())
            .cloned()
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Not authorized, token failed"))
    }
}

#[async_trait]
impl UserDirectory for StubState {
    async fn remove_user_by_email(&self, email: &str) -> E2eResult<u64> {
        let mut store = self.store.write();
        let Some(user) = store.users.remove(email) else {
            return Ok(0);
        };
        store.tokens.retain(|_, user_id| *user_id != user.id);
        Ok(1)
    }
}

/// Non-success response carrying `{message}`
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Perk not found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "message": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Router with every route mounted under `/api`
pub fn router(state: StubState) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(register_handler))
        .route("/perks", get(list_perks_handler).post(create_perk_handler))
        .route(
            "/perks/:id",
            get(get_perk_handler)
                .patch(update_perk_handler)
                .delete(delete_perk_handler),
        );

    Router::new()
        .nest(API_PREFIX, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "perks-stub-backend"
    }))
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

async fn register_handler(
    State(state): State<StubState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(name), Some(email), Some(_password)) = (req.name, req.email, req.password) else {
        return Err(ApiError::bad_request("Name, email and password are required"));
    };
    let email = email.trim().to_lowercase();

    let mut store = state.store.write();
    if store.users.contains_key(&email) {
        return Err(ApiError::bad_request("User already exists"));
    }

    let user = StoredUser {
        id: Uuid::new_v4().simple().to_string(),
        name,
        email: email.clone(),
    };
    let token = Uuid::new_v4().to_string();
    store.tokens.insert(token.clone(), user.id.clone());
    store.users.insert(email, user.clone());

    info!(user_id = %user.id, "Registered user");

    let body = serde_json::json!({
        "token": token,
        "user": RegisteredUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
    });
    Ok((StatusCode::CREATED, Json(body)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerkRequest {
    title: Option<String>,
    #[serde(default)]
    description: String,
    category: Option<String>,
    merchant: Option<String>,
    discount_percent: Option<f64>,
}

fn check_discount(discount: f64) -> ApiResult<f64> {
    if (0.0..=100.0).contains(&discount) {
        Ok(discount)
    } else {
        Err(ApiError::bad_request("Discount must be between 0 and 100"))
    }
}

async fn create_perk_handler(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(req): Json<PerkRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_id = state.authenticate(&headers)?;

    let title = req.title.filter(|t| !t.trim().is_empty());
    let merchant = req.merchant.filter(|m| !m.trim().is_empty());
    let (Some(title), Some(merchant)) = (title, merchant) else {
        return Err(ApiError::bad_request("Title and merchant are required"));
    };

    let perk = Perk {
        id: Uuid::new_v4().simple().to_string(),
        title,
        description: req.description,
        category: req.category.unwrap_or_else(|| "other".to_string()),
        merchant,
        discount_percent: check_discount(req.discount_percent.unwrap_or(0.0))?,
        created_by: Some(user_id),
        created_at: Some(Utc::now()),
    };

    let mut store = state.store.write();
    store.sequence += 1;
    let sequence = store.sequence;
    store.perks.insert(perk.id.clone(), (sequence, perk.clone()));

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "perk": perk }))))
}

async fn list_perks_handler(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let user_id = state.authenticate(&headers)?;

    let store = state.store.read();
    let mut owned: Vec<&(u64, Perk)> = store
        .perks
        .values()
        .filter(|(_, p)| p.created_by.as_deref() == Some(user_id.as_str()))
        .collect();
    owned.sort_by(|a, b| b.0.cmp(&a.0));

    let perks: Vec<&Perk> = owned.into_iter().map(|(_, p)| p).collect();
    Ok(Json(serde_json::json!({ "perks": perks })))
}

async fn get_perk_handler(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.authenticate(&headers)?;

    let store = state.store.read();
    let (_, perk) = store.perks.get(&id).ok_or_else(ApiError::not_found)?;
    Ok(Json(serde_json::json!({ "perk": perk })))
}

async fn update_perk_handler(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<PerkPatch>,
) -> ApiResult<impl IntoResponse> {
    let user_id = state.authenticate(&headers)?;
    let discount = patch.discount_percent.map(check_discount).transpose()?;

    let mut store = state.store.write();
    let perk = match store.perks.get_mut(&id) {
        Some((_, perk)) if perk.created_by.as_deref() == Some(user_id.as_str()) => perk,
        _ => return Err(ApiError::not_found()),
    };

    if let Some(title) = patch.title {
        perk.title = title;
    }
    if let Some(description) = patch.description {
        perk.description = description;
    }
    if let Some(category) = patch.category {
        perk.category = category;
    }
    if let Some(merchant) = patch.merchant {
        perk.merchant = merchant;
    }
    if let Some(discount) = discount {
        perk.discount_percent = discount;
    }

    Ok(Json(serde_json::json!({ "perk": perk })))
}

async fn delete_perk_handler(
    State(state): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user_id = state.authenticate(&headers)?;

    let mut store = state.store.write();
    match store.perks.get(&id) {
        Some((_, perk)) if perk.created_by.as_deref() == Some(user_id.as_str()) => {}
        _ => return Err(ApiError::not_found()),
    }
    store.perks.remove(&id);

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// A stub backend serving on a background task
#[derive(Debug)]
pub struct StubServer {
    addr: SocketAddr,
    state: StubState,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl StubServer {
    /// Bind `127.0.0.1:port` (0 picks a free port) and start serving
    pub async fn spawn(port: u16) -> E2eResult<Self> {
        Self::spawn_with(port, StubState::new()).await
    }

    pub async fn spawn_with(port: u16, state: StubState) -> E2eResult<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let app = router(state.clone());
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        info!("Stub backend listening on http://{}", addr);

        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api_base_url(&self) -> String {
        api_base_url(&self.origin())
    }

    pub fn state(&self) -> &StubState {
        &self.state
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) -> E2eResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(e) => warn!("Stub backend task ended abnormally: {}", e),
            }
        }
        Ok(())
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perkharness_common::{ApiClient, NewPerk, TestCredentials};

    fn perk(title: &str) -> NewPerk {
        NewPerk {
            title: title.to_string(),
            description: "d".into(),
            category: "food".into(),
            merchant: "m".into(),
            discount_percent: 10.0,
        }
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let server = StubServer::spawn(0).await.unwrap();
        let api = ApiClient::new(server.api_base_url()).unwrap();
        let creds = TestCredentials::generate("Stub User");

        let auth = api.register(&creds).await.unwrap();
        assert!(!auth.token.is_empty());
        assert_eq!(auth.user.email, creds.normalized_email());

        let err = api.register(&creds).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("User already exists"));

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_perks_are_scoped_to_their_owner() {
        let server = StubServer::spawn(0).await.unwrap();

        let alice = ApiClient::new(server.api_base_url()).unwrap();
        let token = alice.register(&TestCredentials::generate("Alice")).await.unwrap().token;
        alice.set_bearer_token(token);

        let bob = ApiClient::new(server.api_base_url()).unwrap();
        let token = bob.register(&TestCredentials::generate("Bob")).await.unwrap().token;
        bob.set_bearer_token(token);

        let created = alice.create_perk(&perk("Alice's")).await.unwrap();

        assert!(bob.list_perks().await.unwrap().is_empty());
        assert_eq!(bob.get_perk(&created.id).await.unwrap().title, "Alice's");
        assert_eq!(bob.delete_perk(&created.id).await.unwrap_err().status(), Some(404));
        assert!(server.state().has_perk(&created.id));
    }

    #[tokio::test]
    async fn test_requests_without_token_are_unauthorized() {
        let server = StubServer::spawn(0).await.unwrap();
        let api = ApiClient::new(server.api_base_url()).unwrap();

        let err = api.list_perks().await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_user_directory_revokes_tokens() {
        let server = StubServer::spawn(0).await.unwrap();
        let api = ApiClient::new(server.api_base_url()).unwrap();
        let creds = TestCredentials::generate("Reaped");
        api.set_bearer_token(api.register(&creds).await.unwrap().token);

        let state = server.state().clone();
        assert_eq!(state.remove_user_by_email(&creds.normalized_email()).await.unwrap(), 1);
        assert_eq!(state.remove_user_by_email(&creds.normalized_email()).await.unwrap(), 0);
        assert!(!state.has_user(&creds.email));
        assert_eq!(api.list_perks().await.unwrap_err().status(), Some(401));
    }
}
