//! Routed render harness
//!
//! Pages are mounted behind an in-memory router and rendered into a
//! [`Document`] that tests query the way a user would see it: by text,
//! placeholder, role, button label or test id.

pub mod document;
pub mod harness;
pub mod router;
pub mod view;

pub use document::{Document, Node, Query, Role};
pub use harness::{render_at_route, RenderedHandle};
pub use router::{MemoryHistory, RouteParams, RoutePattern, Routes};
pub use view::{Mount, Page, Reaction, StaticPage, Task, UiEvent, View};
