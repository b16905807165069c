//! Perks Stub Backend
//!
//! Serves the perks REST contract from memory on `PORT` (default 4000), so
//! the orchestrator and the page suites can run without Node or MongoDB.

use std::net::SocketAddr;
use tracing::info;

use perkharness_e2e::stub::{router, StubState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let port: u16 = match std::env::var("PORT") {
        Ok(value) => value.trim().parse()?,
        Err(_) => 4000,
    };
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Perks stub backend listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(StubState::new()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Perks stub backend stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
