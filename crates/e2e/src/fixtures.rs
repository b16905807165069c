//! Deterministic fixtures and created-record tracking

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use perkharness_common::{ApiClient, NewPerk, Perk};

use crate::error::{E2eError, E2eResult};

pub const SEEDED_TITLE: &str = "Integration Preview Benefit";
pub const SEEDED_MERCHANT: &str = "Integration Merchant";
pub const SEEDED_CATEGORY: &str = "travel";
pub const SEEDED_DISCOUNT: f64 = 15.0;

/// The baseline perk every suite seeds. Values are fixed so assertions can
/// match literal text.
pub fn seeded_perk() -> NewPerk {
    NewPerk {
        title: SEEDED_TITLE.to_string(),
        description: "Baseline record created during setup for deterministic rendering checks."
            .to_string(),
        category: SEEDED_CATEGORY.to_string(),
        merchant: SEEDED_MERCHANT.to_string(),
        discount_percent: SEEDED_DISCOUNT,
    }
}

/// Ids of every perk the suite created, for teardown. Only ids the backend
/// returned from a successful create go in here.
#[derive(Debug, Clone, Default)]
pub struct CreatedPerks {
    ids: Arc<Mutex<BTreeSet<String>>>,
}

impl CreatedPerks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a created perk; returns false if it was already tracked
    pub fn track(&self, perk: &Perk) -> bool {
        self.ids.lock().insert(perk.id.clone())
    }

    /// Stop tracking an id, e.g. after a test deleted it itself
    pub fn forget(&self, id: &str) -> bool {
        self.ids.lock().remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    /// Snapshot of the tracked ids
    pub fn ids(&self) -> Vec<String> {
        self.ids.lock().iter().cloned().collect()
    }

    /// Remove and return every tracked id
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.ids.lock()).into_iter().collect()
    }
}

/// Create a perk through `api` and track it for cleanup
pub async fn create_tracked(api: &ApiClient, created: &CreatedPerks, perk: &NewPerk) -> E2eResult<Perk> {
    let perk = api.create_perk(perk).await?;
    created.track(&perk);
    Ok(perk)
}

/// Seed the baseline perk. Needs an authenticated `api`, so it runs after
/// the session bootstrap.
pub async fn seed(api: &ApiClient, created: &CreatedPerks) -> E2eResult<Perk> {
    let perk = api
        .create_perk(&seeded_perk())
        .await
        .map_err(E2eError::setup("seeding the baseline perk"))?;

    created.track(&perk);
    info!(perk_id = %perk.id, title = %perk.title, "Seeded baseline perk");
    Ok(perk)
}
