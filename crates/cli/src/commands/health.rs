//! Health check against an already running backend

use std::time::Duration;

use clap::Args;
use serde::Serialize;

use perkharness_common::env::DEFAULT_BASE_URL;
use perkharness_common::Poll;
use perkharness_e2e::server::wait_for_health;

use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct HealthArgs {
    /// API base URL; `/health` is appended
    #[arg(long, env = "TEST_BASE_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Maximum number of probes
    #[arg(long, default_value = "60")]
    attempts: u32,

    /// Delay between probes in milliseconds
    #[arg(long, default_value = "500")]
    interval_ms: u64,
}

#[derive(Serialize)]
struct HealthReport {
    url: String,
    attempts: u32,
}

impl TableDisplay for HealthReport {
    fn headers() -> Vec<&'static str> {
        vec!["Health URL", "Attempts"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.url.clone(), self.attempts.to_string()]
    }
}

fn health_url(base_url: &str) -> String {
    format!("{}/health", base_url.trim_end_matches('/'))
}

pub async fn execute(args: HealthArgs, format: OutputFormat) -> anyhow::Result<()> {
    let url = health_url(&args.url);
    let poll = Poll::fixed(args.attempts.max(1), Duration::from_millis(args.interval_ms));

    match wait_for_health(&url, poll).await {
        Ok(attempts) => {
            output::print_item(&HealthReport { url, attempts }, format);
            output::print_success("Backend is healthy");
            Ok(())
        }
        Err(e) => {
            output::print_error(&format!("Backend is not healthy: {}", e));
            std::process::exit(1);
        }
    }
}
