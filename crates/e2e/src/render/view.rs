//! What a routed page is to the harness

use futures::future::BoxFuture;

use crate::app::ClientApp;
use crate::render::document::{Document, Node};
use crate::render::router::RouteParams;

/// Background work started by a view. Resolves to a location to navigate
/// to, if any.
pub type Task = BoxFuture<'static, Option<String>>;

/// What a view asks the harness to do after an event
pub enum Reaction {
    None,
    Navigate(String),
    Spawn(Task),
}

impl std::fmt::Debug for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reaction::None => f.write_str("None"),
            Reaction::Navigate(to) => f.debug_tuple("Navigate").field(to).finish(),
            Reaction::Spawn(_) => f.write_str("Spawn(..)"),
        }
    }
}

/// User input delivered to the element identified by `key`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Change { key: String, value: String },
    Click { key: String },
}

/// Everything a page gets when it is mounted at a location
#[derive(Debug, Clone)]
pub struct Mount {
    pub params: RouteParams,
    pub location: String,
    pub app: ClientApp,
}

/// A routable page; builds a fresh view on every mount
pub trait Page: Send + Sync {
    fn mount(&self, mount: Mount) -> Box<dyn View>;
}

/// A mounted page instance
pub trait View: Send + Sync {
    fn render(&self) -> Document;

    /// Data loading to start as soon as the view is mounted
    fn on_mount(&self) -> Option<Task> {
        None
    }

    fn on_event(&self, _event: &UiEvent) -> Reaction {
        Reaction::None
    }
}

/// A page that renders one fixed text element, used as a redirect target
#[derive(Debug, Clone)]
pub struct StaticPage {
    test_id: String,
    text: String,
}

impl StaticPage {
    pub fn new(test_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            text: text.into(),
        }
    }
}

impl Page for StaticPage {
    fn mount(&self, _mount: Mount) -> Box<dyn View> {
        Box::new(self.clone())
    }
}

impl View for StaticPage {
    fn render(&self) -> Document {
        let mut doc = Document::new();
        doc.push(Node::text(self.text.clone()).with_test_id(self.test_id.clone()));
        doc
    }
}
