//! CLI command implementations

pub mod health;
pub mod reap;
pub mod run;
