//! Client-side persisted storage
//!
//! Stands in for the browser's `localStorage`: the client under test reads
//! its auth token from here when it boots, so writing a token before a page
//! is rendered makes that page behave as a logged-in session.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Key the client reads its bearer token from
pub const TOKEN_KEY: &str = "token";

/// Shared string key/value store; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.inner.read().get(key).cloned()
    }

    pub fn set_item(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.write().insert(key.into(), value.into());
    }

    pub fn remove_item(&self, key: &str) -> Option<String> {
        self.inner.write().remove(key)
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn token(&self) -> Option<String> {
        self.get_item(TOKEN_KEY)
    }
}
