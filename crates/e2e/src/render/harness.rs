//! Mounting routed pages against the live backend and driving them
//!
//! There is no network or router stubbing: views talk to the backend through
//! the app's real [`ApiClient`](perkharness_common::ApiClient), and
//! navigation goes through a real in-memory history. Because data arrives
//! asynchronously, assertions poll the document until it settles.

use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use perkharness_common::{Poll, PollError, Probe};

use crate::app::ClientApp;
use crate::error::{E2eError, E2eResult};
use crate::render::document::{Document, Node, Query, Role};
use crate::render::router::{MemoryHistory, Routes};
use crate::render::view::{Mount, Reaction, Task, UiEvent, View};

struct RouterState {
    history: MemoryHistory,
    view: Arc<dyn View>,
    /// Bumped on every mount; tasks of an older mount cannot navigate
    generation: u64,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    routes: Routes,
    app: ClientApp,
    state: Mutex<RouterState>,
}

impl Inner {
    fn instantiate(&self, location: &str) -> E2eResult<Arc<dyn View>> {
        let (page, params) = self
            .routes
            .resolve(location)
            .ok_or_else(|| E2eError::NoRoute(location.to_string()))?;

        let view = page.mount(Mount {
            params,
            location: location.to_string(),
            app: self.app.clone(),
        });
        Ok(Arc::from(view))
    }

    /// Make `view` current and start its mount effects. Caller holds the lock.
    fn activate(self: &Arc<Self>, state: &mut RouterState, view: Arc<dyn View>) {
        for task in state.tasks.drain(..) {
            task.abort();
        }
        state.generation += 1;
        state.view = Arc::clone(&view);

        debug!(location = %state.history.location(), generation = state.generation, "Mounted view");

        if let Some(task) = view.on_mount() {
            self.spawn(state, task);
        }
    }

    fn spawn(self: &Arc<Self>, state: &mut RouterState, task: Task) {
        let generation = state.generation;
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let Some(target) = task.await else { return };
            if let Some(inner) = weak.upgrade() {
                inner.navigate_from(generation, &target);
            }
        });
        state.tasks.push(handle);
    }

    fn push(self: &Arc<Self>, state: &mut RouterState, to: &str) -> E2eResult<()> {
        let view = self.instantiate(to)?;
        state.history.push(to);
        self.activate(state, view);
        Ok(())
    }

    fn navigate_from(self: &Arc<Self>, generation: u64, to: &str) {
        let mut state = self.state.lock();
        if state.generation != generation {
            debug!(to, "Dropping navigation from an unmounted view");
            return;
        }
        if let Err(e) = self.push(&mut state, to) {
            warn!("Navigation to {} failed: {}", to, e);
        }
    }

    fn abort_all(&self) {
        for task in self.state.lock().tasks.drain(..) {
            task.abort();
        }
    }
}

/// Render the page routed at the last of `initial_entries`. Must be called
/// from within a Tokio runtime, since mount effects are spawned onto it.
pub fn render_at_route<I, S>(routes: Routes, initial_entries: I, app: &ClientApp) -> E2eResult<RenderedHandle>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let history = MemoryHistory::new(initial_entries);

    let mut inner = Inner {
        routes,
        app: app.clone(),
        state: Mutex::new(RouterState {
            view: Arc::new(Blank),
            history,
            generation: 0,
            tasks: Vec::new(),
        }),
    };

    let location = inner.state.get_mut().history.location().to_string();
    let view = inner.instantiate(&location)?;

    let inner = Arc::new(inner);
    {
        let mut state = inner.state.lock();
        inner.activate(&mut state, view);
    }

    Ok(RenderedHandle {
        inner,
        poll: Poll::assertion_default(),
    })
}

/// Placeholder until the first view is mounted
struct Blank;

impl View for Blank {
    fn render(&self) -> Document {
        Document::new()
    }
}

/// A mounted route tree. Dropping it aborts any in-flight view effects.
pub struct RenderedHandle {
    inner: Arc<Inner>,
    poll: Poll,
}

impl RenderedHandle {
    /// Override the assertion poll used by the `wait_for*` family
    pub fn with_poll(mut self, poll: Poll) -> Self {
        self.poll = poll;
        self
    }

    fn current_view(&self) -> Arc<dyn View> {
        Arc::clone(&self.inner.state.lock().view)
    }

    /// Snapshot of what the current view renders right now
    pub fn document(&self) -> Document {
        self.current_view().render()
    }

    pub fn location(&self) -> String {
        self.inner.state.lock().history.location().to_string()
    }

    pub fn history(&self) -> Vec<String> {
        self.inner.state.lock().history.entries().to_vec()
    }

    /// Push `to` onto the history and mount whatever it routes to
    pub fn navigate(&self, to: &str) -> E2eResult<()> {
        let mut state = self.inner.state.lock();
        self.inner.push(&mut state, to)
    }

    /// Step back in history; false if already at the first entry
    pub fn back(&self) -> E2eResult<bool> {
        let mut state = self.inner.state.lock();
        if !state.history.back() {
            return Ok(false);
        }
        let location = state.history.location().to_string();
        let view = self.inner.instantiate(&location)?;
        self.inner.activate(&mut state, view);
        Ok(true)
    }

    fn target(&self, query: &Query, roles: &[Role]) -> E2eResult<String> {
        let doc = self.document();
        let node = doc
            .find_all(query)
            .into_iter()
            .find(|n| roles.contains(&n.role))
            .ok_or_else(|| E2eError::ElementNotFound(query.to_string()))?;

        node.key
            .clone()
            .ok_or_else(|| E2eError::ElementNotFound(format!("interactive element for {}", query)))
    }

    /// Set the value of the first textbox or combobox matching `query`
    pub fn change(&self, query: &Query, value: impl Into<String>) -> E2eResult<()> {
        let key = self.target(query, &[Role::Textbox, Role::Combobox])?;
        self.dispatch(UiEvent::Change {
            key,
            value: value.into(),
        })
    }

    /// Click the first button matching `query`
    pub fn click(&self, query: &Query) -> E2eResult<()> {
        let key = self.target(query, &[Role::Button])?;
        self.dispatch(UiEvent::Click { key })
    }

    fn dispatch(&self, event: UiEvent) -> E2eResult<()> {
        let (view, generation) = {
            let state = self.inner.state.lock();
            (Arc::clone(&state.view), state.generation)
        };

        match view.on_event(&event) {
            Reaction::None => Ok(()),
            Reaction::Navigate(to) => self.navigate(&to),
            Reaction::Spawn(task) => {
                let mut state = self.inner.state.lock();
                if state.generation == generation {
                    self.inner.spawn(&mut state, task);
                }
                Ok(())
            }
        }
    }

    /// Poll the document until `check` yields a value. Exhausting the
    /// attempts fails with [`E2eError::AssertionTimeout`].
    pub async fn wait_for<T, F>(&self, expected: impl Into<String>, mut check: F) -> E2eResult<T>
    where
        F: FnMut(&Document) -> Option<T>,
    {
        let expected = expected.into();
        let outcome = self
            .poll
            .until(|_| {
                let doc = self.document();
                let probe: Probe<T, Infallible> = match check(&doc) {
                    Some(value) => Probe::Ready(value),
                    None => Probe::Pending(format!("{:?}", doc.text_content())),
                };
                async move { probe }
            })
            .await;

        match outcome {
            Ok(value) => Ok(value),
            Err(PollError::Exhausted { attempts, last }) => {
                debug!(expected = %expected, rendered = %last, "Assertion never settled");
                Err(E2eError::AssertionTimeout { expected, attempts })
            }
            Err(PollError::Aborted(never)) => match never {},
        }
    }

    /// Wait for an element matching `query` and return it
    pub async fn wait_for_element(&self, query: &Query) -> E2eResult<Node> {
        self.wait_for(query.to_string(), |doc| doc.find(query).cloned())
            .await
    }

    /// Wait for an element whose whole text is `text`
    pub async fn wait_for_text(&self, text: &str) -> E2eResult<Node> {
        self.wait_for_element(&Query::text(text)).await
    }

    /// Wait until nothing matches `query`
    pub async fn wait_until_gone(&self, query: &Query) -> E2eResult<()> {
        self.wait_for(format!("no {}", query), |doc| (!doc.contains(query)).then_some(()))
            .await
    }

    pub async fn wait_for_location(&self, location: &str) -> E2eResult<()> {
        let expected = format!("location {}", location);
        self.wait_for(expected, |_| (self.location() == location).then_some(()))
            .await
    }

    /// Abort in-flight effects and drop the view
    pub fn unmount(self) {}
}

impl Drop for RenderedHandle {
    fn drop(&mut self) {
        self.inner.abort_all();
    }
}

impl std::fmt::Debug for RenderedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RenderedHandle")
            .field("location", &state.history.location())
            .field("routes", &self.inner.routes)
            .field("generation", &state.generation)
            .finish()
    }
}
