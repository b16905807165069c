//! Perk details (`/perks/:perkId/view`)

use parking_lot::Mutex;
use std::sync::Arc;

use perkharness_common::{ApiClient, Perk};

use super::{failure_message, Load};
use crate::render::{Document, Mount, Node, Page, Reaction, Task, UiEvent, View};

pub const NOT_FOUND: &str = "Perk not found.";

pub struct PerkDetailsPage;

impl Page for PerkDetailsPage {
    fn mount(&self, mount: Mount) -> Box<dyn View> {
        let perk_id = mount.params.get("perkId").map(str::to_string);
        let state = match perk_id {
            Some(_) => Load::Loading,
            None => Load::Failed(NOT_FOUND.to_string()),
        };

        Box::new(PerkDetails {
            api: mount.app.api().clone(),
            perk_id,
            perk: Arc::new(Mutex::new(state)),
        })
    }
}

struct PerkDetails {
    api: ApiClient,
    perk_id: Option<String>,
    perk: Arc<Mutex<Load<Perk>>>,
}

impl View for PerkDetails {
    fn render(&self) -> Document {
        let mut doc = Document::new();

        match &*self.perk.lock() {
            Load::Loading => {
                doc.push(Node::text("Loading perk..."));
            }
            Load::Failed(message) => {
                doc.push(Node::alert(message.clone()));
            }
            Load::Loaded(perk) => {
                doc.push(Node::heading(perk.title.clone()))
                    .push(Node::text(perk.description.clone()))
                    .push(Node::text(format!("Category: {}", perk.category)))
                    .push(Node::text(format!("Merchant: {}", perk.merchant)))
                    .push(Node::text(format!("Discount: {}%", perk.discount_percent)))
                    .push(Node::button("edit", "Edit"));
            }
        }
        doc.push(Node::button("back", "Back to My Perks"));
        doc
    }

    fn on_mount(&self) -> Option<Task> {
        let id = self.perk_id.clone()?;
        let api = self.api.clone();
        let slot = Arc::clone(&self.perk);

        Some(Box::pin(async move {
            let outcome = match api.get_perk(&id).await {
                Ok(perk) => Load::Loaded(perk),
                Err(e) if e.status() == Some(404) => Load::Failed(NOT_FOUND.to_string()),
                Err(e) => Load::Failed(failure_message(&e)),
            };
            *slot.lock() = outcome;
            None
        }))
    }

    fn on_event(&self, event: &UiEvent) -> Reaction {
        match event {
            UiEvent::Click { key } if key == "back" => Reaction::Navigate("/perks".to_string()),
            UiEvent::Click { key } if key == "edit" => match &self.perk_id {
                Some(id) => Reaction::Navigate(format!("/perks/{}/edit", id)),
                None => Reaction::None,
            },
            _ => Reaction::None,
        }
    }
}
