//! Perkharness E2E Test Framework
//!
//! This crate runs the perks client's page tests against a live backend:
//! - Spawns the backend as a subprocess and waits for its health check
//! - Registers a throwaway user and seeds one deterministic perk
//! - Mounts routed pages headlessly and asserts on what they render
//! - Deletes everything the suite created, whatever the outcome
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Orchestrator (Rust)                       │
//! │    Starting -> Ready -> RunningTests -> ShuttingDown -> Done│
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServerHandle                                               │
//! │    ├── start(ServerConfig)       PORT, harness env          │
//! │    ├── wait_until_ready()        GET /api/health, bounded   │
//! │    └── stop()                    SIGTERM, grace, SIGKILL    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteContext                                               │
//! │    ├── setup()    register user -> seed perk                │
//! │    ├── run(body)  body, then teardown (even on panic)       │
//! │    └── teardown() delete perks -> remove user               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  render_at_route(routes, entries, app) -> RenderedHandle    │
//! │    ├── memory history, :param routes                        │
//! │    ├── change / click / navigate                            │
//! │    └── wait_for(..)  bounded polling with backoff           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod error;
pub mod fixtures;
pub mod pages;
pub mod reaper;
pub mod render;
pub mod runner;
pub mod server;
pub mod session;
pub mod stub;
pub mod suite;

pub use app::ClientApp;
pub use error::{E2eError, E2eResult};
pub use reaper::{MongoUserDirectory, UserDirectory};
pub use render::{render_at_route, Query, RenderedHandle, Routes};
pub use runner::{Orchestrator, Phase, RunReport, TestCommand};
pub use server::{OutputMode, ServerConfig, ServerHandle};
pub use session::AuthSession;
pub use stub::{StubServer, StubState};
pub use suite::{SuiteContext, SuiteOutcome};
