use anyhow::{Context, Result};
use std::net::SocketAddr;

use weather_intel::config::Config;
use weather_intel::{build_assistant, init_tracing, server};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load();
    let assistant = build_assistant(&config)
        .await
        .context("Failed to start weather assistant")?;

    let bind: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| {
            format!(
                "Invalid bind address '{}' (expected host:port)",
                config.server.bind
            )
        })?;

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "Starting weather assistant HTTP server");

    axum::serve(listener, server::router(assistant))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
