//! Perk form: create at `/perks/create`, edit at `/perks/:perkId/edit`
//!
//! Saving goes to the live backend and redirects to `/perks` once it
//! answers. An edit sends only the fields that differ from what was loaded.

use parking_lot::Mutex;
use std::sync::Arc;

use perkharness_common::{ApiClient, NewPerk, Perk, PerkPatch};

use super::{failure_message, CATEGORIES};
use crate::render::{Document, Mount, Node, Page, Reaction, Task, UiEvent, View};

pub struct PerkFormPage;

impl Page for PerkFormPage {
    fn mount(&self, mount: Mount) -> Box<dyn View> {
        let editing = mount.params.get("perkId").map(str::to_string);
        let status = if editing.is_some() {
            Status::Loading
        } else {
            Status::Editing
        };

        Box::new(PerkForm {
            api: mount.app.api().clone(),
            editing,
            state: Arc::new(Mutex::new(FormState {
                fields: Fields::default(),
                original: None,
                status,
            })),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Fields {
    title: String,
    merchant: String,
    category: String,
    discount: String,
    description: String,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            title: String::new(),
            merchant: String::new(),
            category: CATEGORIES[0].to_string(),
            discount: String::new(),
            description: String::new(),
        }
    }
}

impl From<&Perk> for Fields {
    fn from(perk: &Perk) -> Self {
        Self {
            title: perk.title.clone(),
            merchant: perk.merchant.clone(),
            category: perk.category.clone(),
            discount: perk.discount_percent.to_string(),
            description: perk.description.clone(),
        }
    }
}

impl Fields {
    fn set(&mut self, key: &str, value: &str) {
        let field = match key {
            "title" => &mut self.title,
            "merchant" => &mut self.merchant,
            "category" => &mut self.category,
            "discount" => &mut self.discount,
            "description" => &mut self.description,
            _ => return,
        };
        *field = value.to_string();
    }

    /// Input checks the form itself enforces before submitting
    fn validate(&self) -> Result<NewPerk, String> {
        if self.title.trim().is_empty() {
            return Err("Title is required.".to_string());
        }
        if self.merchant.trim().is_empty() {
            return Err("Merchant is required.".to_string());
        }
        let discount_percent: f64 = self
            .discount
            .trim()
            .parse()
            .map_err(|_| "Discount must be a number.".to_string())?;

        Ok(NewPerk {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            category: self.category.clone(),
            merchant: self.merchant.trim().to_string(),
            discount_percent,
        })
    }
}

/// Fields of `perk` that differ from `original`
fn diff(original: &Perk, perk: &NewPerk) -> PerkPatch {
    fn changed<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
        (old != new).then(|| new.clone())
    }

    PerkPatch {
        title: changed(&original.title, &perk.title),
        description: changed(&original.description, &perk.description),
        category: changed(&original.category, &perk.category),
        merchant: changed(&original.merchant, &perk.merchant),
        discount_percent: changed(&original.discount_percent, &perk.discount_percent),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Status {
    Loading,
    Editing,
    Saving,
    Failed(String),
}

#[derive(Debug)]
struct FormState {
    fields: Fields,
    original: Option<Perk>,
    status: Status,
}

struct PerkForm {
    api: ApiClient,
    editing: Option<String>,
    state: Arc<Mutex<FormState>>,
}

impl PerkForm {
    fn submit(&self) -> Reaction {
        let mut state = self.state.lock();
        if matches!(state.status, Status::Loading | Status::Saving) {
            return Reaction::None;
        }

        let perk = match state.fields.validate() {
            Ok(perk) => perk,
            Err(message) => {
                state.status = Status::Failed(message);
                return Reaction::None;
            }
        };

        let api = self.api.clone();
        let slot = Arc::clone(&self.state);

        let request: Task = match (&self.editing, &state.original) {
            (Some(id), Some(original)) => {
                let patch = diff(original, &perk);
                if patch.is_empty() {
                    return Reaction::Navigate("/perks".to_string());
                }
                let id = id.clone();
                Box::pin(async move { finish(&slot, api.update_perk(&id, &patch).await.map(drop)) })
            }
            (Some(_), None) => return Reaction::None,
            (None, _) => Box::pin(async move { finish(&slot, api.create_perk(&perk).await.map(drop)) }),
        };

        state.status = Status::Saving;
        Reaction::Spawn(request)
    }
}

fn finish(slot: &Mutex<FormState>, outcome: perkharness_common::Result<()>) -> Option<String> {
    match outcome {
        Ok(()) => Some("/perks".to_string()),
        Err(e) => {
            slot.lock().status = Status::Failed(failure_message(&e));
            None
        }
    }
}

impl View for PerkForm {
    fn render(&self) -> Document {
        let state = self.state.lock();
        let fields = &state.fields;

        let mut doc = Document::new();
        doc.push(Node::heading(if self.editing.is_some() {
            "Edit Perk"
        } else {
            "Create Perk"
        }));

        if state.status == Status::Loading {
            doc.push(Node::text("Loading perk..."));
            return doc;
        }

        doc.push(Node::textbox("title", "Title", fields.title.clone()))
            .push(Node::textbox("merchant", "Merchant", fields.merchant.clone()))
            .push(Node::combobox("category", CATEGORIES, fields.category.clone()))
            .push(Node::textbox("discount", "Discount %", fields.discount.clone()))
            .push(Node::textbox("description", "Description", fields.description.clone()));

        if let Status::Failed(message) = &state.status {
            doc.push(Node::alert(message.clone()));
        }

        let label = if state.status == Status::Saving {
            "Saving..."
        } else {
            "Save Perk"
        };
        doc.push(Node::button("save", label))
            .push(Node::button("cancel", "Cancel"));
        doc
    }

    fn on_mount(&self) -> Option<Task> {
        let id = self.editing.clone()?;
        let api = self.api.clone();
        let slot = Arc::clone(&self.state);

        Some(Box::pin(async move {
            let outcome = api.get_perk(&id).await;
            let mut state = slot.lock();
            match outcome {
                Ok(perk) => {
                    state.fields = Fields::from(&perk);
                    state.original = Some(perk);
                    state.status = Status::Editing;
                }
                Err(e) => state.status = Status::Failed(failure_message(&e)),
            }
            None
        }))
    }

    fn on_event(&self, event: &UiEvent) -> Reaction {
        match event {
            UiEvent::Change { key, value } => {
                self.state.lock().fields.set(key, value);
                Reaction::None
            }
            UiEvent::Click { key } if key == "save" => self.submit(),
            UiEvent::Click { key } if key == "cancel" => Reaction::Navigate("/perks".to_string()),
            UiEvent::Click { .. } => Reaction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> Perk {
        Perk {
            id: "p1".into(),
            title: "Gym Pass".into(),
            description: "Monthly".into(),
            category: "fitness".into(),
            merchant: "FitCo".into(),
            discount_percent: 20.0,
            created_by: None,
            created_at: None,
        }
    }

    #[test]
    fn test_validation() {
        let mut fields = Fields::default();
        assert_eq!(fields.validate().unwrap_err(), "Title is required.");

        fields.set("title", "Gym Pass");
        fields.set("merchant", "FitCo");
        fields.set("discount", "abc");
        assert_eq!(fields.validate().unwrap_err(), "Discount must be a number.");

        fields.set("discount", " 30 ");
        fields.set("unknown", "ignored");
        let perk = fields.validate().unwrap();
        assert_eq!(perk.discount_percent, 30.0);
        assert_eq!(perk.category, "food");
    }

    #[test]
    fn test_diff_only_changed_fields() {
        let original = loaded();
        let mut fields = Fields::from(&original);
        assert!(diff(&original, &fields.validate().unwrap()).is_empty());

        fields.set("discount", "40");
        fields.set("category", "tech");
        let patch = diff(&original, &fields.validate().unwrap());

        assert_eq!(
            patch,
            PerkPatch {
                category: Some("tech".into()),
                discount_percent: Some(40.0),
                ..PerkPatch::default()
            }
        );
    }
}
