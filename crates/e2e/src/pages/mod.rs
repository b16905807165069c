//! Headless versions of the routed client pages
//!
//! Each page fetches through the app's [`ApiClient`](perkharness_common::ApiClient)
//! when mounted and renders whatever it has so far, so a freshly mounted
//! page shows its loading state until the live backend answers.

pub mod all_perks;
pub mod details;
pub mod form;
pub mod perks;

pub use all_perks::DirectoryPage;
pub use details::PerkDetailsPage;
pub use form::PerkFormPage;
pub use perks::MyPerksPage;

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

use perkharness_common::Perk;

use crate::render::{Node, Routes, Task};

/// Categories offered by the perk form
pub const CATEGORIES: [&str; 6] = ["food", "tech", "travel", "fitness", "entertainment", "other"];

/// The client's route table
pub fn app_routes() -> Routes {
    Routes::new()
        .route("/perks", MyPerksPage)
        .route("/explore", DirectoryPage)
        .route("/perks/create", PerkFormPage)
        .route("/perks/:perkId/view", PerkDetailsPage)
        .route("/perks/:perkId/edit", PerkFormPage)
}

/// Remote data as a page sees it
#[derive(Debug, Clone, PartialEq)]
pub enum Load<T> {
    Loading,
    Loaded(T),
    Failed(String),
}

/// Task that runs `fetch` and stores the outcome in `slot`
fn load_into<T, F>(slot: Arc<Mutex<Load<T>>>, fetch: F) -> Task
where
    T: Send + 'static,
    F: Future<Output = perkharness_common::Result<T>> + Send + 'static,
{
    Box::pin(async move {
        let outcome = match fetch.await {
            Ok(value) => Load::Loaded(value),
            Err(e) => {
                warn!("Page data request failed: {}", e);
                Load::Failed(failure_message(&e))
            }
        };
        *slot.lock() = outcome;
        None
    })
}

fn failure_message(e: &perkharness_common::Error) -> String {
    match e {
        perkharness_common::Error::Api { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// The text line shown under a perk's title in lists
fn summary_line(perk: &Perk) -> String {
    format!("{} - {}% off", perk.merchant, perk.discount_percent)
}

fn perk_nodes(perk: &Perk) -> [Node; 2] {
    [Node::text(perk.title.clone()), Node::text(summary_line(perk))]
}
