//! Directory (`/explore`): browse perks with name and merchant filters
//!
//! Filtering happens on the loaded list; changing a filter never issues a
//! request.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use perkharness_common::{ApiClient, Perk};

use super::{load_into, perk_nodes, Load};
use crate::render::{Document, Mount, Node, Page, Reaction, Task, UiEvent, View};

pub const NAME_PLACEHOLDER: &str = "Enter perk name...";

pub struct DirectoryPage;

impl Page for DirectoryPage {
    fn mount(&self, mount: Mount) -> Box<dyn View> {
        Box::new(Directory {
            api: mount.app.api().clone(),
            perks: Arc::new(Mutex::new(Load::Loading)),
            filters: Mutex::new(Filters::default()),
        })
    }
}

#[derive(Debug, Default)]
struct Filters {
    name: String,
    merchant: String,
}

impl Filters {
    fn admits(&self, perk: &Perk) -> bool {
        let name = self.name.trim().to_lowercase();
        (name.is_empty() || perk.title.to_lowercase().contains(&name))
            && (self.merchant.is_empty() || perk.merchant == self.merchant)
    }
}

struct Directory {
    api: ApiClient,
    perks: Arc<Mutex<Load<Vec<Perk>>>>,
    filters: Mutex<Filters>,
}

impl View for Directory {
    fn render(&self) -> Document {
        let filters = self.filters.lock();
        let perks = self.perks.lock();

        let merchants: BTreeSet<&str> = match &*perks {
            Load::Loaded(perks) => perks.iter().map(|p| p.merchant.as_str()).collect(),
            _ => BTreeSet::new(),
        };

        let mut doc = Document::new();
        doc.push(Node::heading("All Perks"))
            .push(Node::textbox("name", NAME_PLACEHOLDER, filters.name.clone()))
            .push(Node::combobox(
                "merchant",
                std::iter::once("").chain(merchants),
                filters.merchant.clone(),
            ));

        match &*perks {
            Load::Loading => {
                doc.push(Node::text("Loading perks..."));
            }
            Load::Failed(message) => {
                doc.push(Node::alert(message.clone()));
            }
            Load::Loaded(all) => {
                let visible: Vec<&Perk> = all.iter().filter(|p| filters.admits(p)).collect();
                doc.push(Node::text(format!("Showing {} of {} perks", visible.len(), all.len())));

                if visible.is_empty() {
                    doc.push(Node::text("No perks match your filters."));
                }
                for perk in visible {
                    for node in perk_nodes(perk) {
                        doc.push(node);
                    }
                }
            }
        }
        doc
    }

    fn on_mount(&self) -> Option<Task> {
        let api = self.api.clone();
        Some(load_into(Arc::clone(&self.perks), async move {
            api.list_perks().await
        }))
    }

    fn on_event(&self, event: &UiEvent) -> Reaction {
        if let UiEvent::Change { key, value } = event {
            let mut filters = self.filters.lock();
            match key.as_str() {
                "name" => filters.name = value.clone(),
                "merchant" => filters.merchant = value.clone(),
                _ => {}
            }
        }
        Reaction::None
    }
}
