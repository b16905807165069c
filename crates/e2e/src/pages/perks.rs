//! My Perks (`/perks`): the perks the logged-in user created

use parking_lot::Mutex;
use std::sync::Arc;

use perkharness_common::{ApiClient, Perk};

use super::{load_into, perk_nodes, Load};
use crate::render::{Document, Mount, Node, Page, Reaction, Task, UiEvent, View};

pub struct MyPerksPage;

impl Page for MyPerksPage {
    fn mount(&self, mount: Mount) -> Box<dyn View> {
        Box::new(MyPerks {
            api: mount.app.api().clone(),
            perks: Arc::new(Mutex::new(Load::Loading)),
        })
    }
}

struct MyPerks {
    api: ApiClient,
    perks: Arc<Mutex<Load<Vec<Perk>>>>,
}

impl View for MyPerks {
    fn render(&self) -> Document {
        let mut doc = Document::new();
        doc.push(Node::heading("My Perks"))
            .push(Node::button("add", "Add Perk"));

        match &*self.perks.lock() {
            Load::Loading => {
                doc.push(Node::text("Loading perks..."));
            }
            Load::Failed(message) => {
                doc.push(Node::alert(message.clone()));
            }
            Load::Loaded(perks) if perks.is_empty() => {
                doc.push(Node::text("No perks found."));
            }
            Load::Loaded(perks) => {
                for perk in perks {
                    for node in perk_nodes(perk) {
                        doc.push(node);
                    }
                    doc.push(Node::button(&format!("view:{}", perk.id), "View"))
                        .push(Node::button(&format!("edit:{}", perk.id), "Edit"));
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
        let UiEvent::Click { key } = event else {
            return Reaction::None;
        };

        if key == "add" {
            return Reaction::Navigate("/perks/create".to_string());
        }
        match key.split_once(':') {
            Some(("view", id)) => Reaction::Navigate(format!("/perks/{}/view", id)),
            Some(("edit", id)) => Reaction::Navigate(format!("/perks/{}/edit", id)),
            _ => Reaction::None,
        }
    }
}
