//! Manual removal of a test user left behind by an aborted run

use std::path::Path;

use anyhow::Context;
use clap::Args;
use tracing::info;

use perkharness_common::EnvLoader;
use perkharness_e2e::{MongoUserDirectory, UserDirectory};

use crate::output;

#[derive(Args)]
pub struct ReapArgs {
    /// Email the test user registered with
    #[arg(long)]
    email: String,

    /// MongoDB connection string (defaults to the harness environment)
    #[arg(long)]
    mongo_uri: Option<String>,
}

pub async fn execute(args: ReapArgs, env_file: &Path) -> anyhow::Result<()> {
    let uri = match args.mongo_uri {
        Some(uri) => uri,
        None => EnvLoader::new()
            .with_file(env_file)
            .load()
            .context("Failed to resolve the harness environment")?
            .mongo_uri()
            .to_string(),
    };

    let email = args.email.trim().to_lowercase();
    let users = MongoUserDirectory::connect(&uri)
        .await
        .context("Failed to connect to MongoDB")?;

    let removed = users.remove_user_by_email(&email).await?;
    info!(email = %email, removed, "Reaped test user");

    if removed == 0 {
        output::print_success(&format!("No user with email {} (already gone)", email));
    } else {
        output::print_success(&format!("Removed user {}", email));
    }
    Ok(())
}
