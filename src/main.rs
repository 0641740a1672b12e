//! push-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use push_gateway::app_state::AppState;
use push_gateway::config::PushConfig;
use push_gateway::service::spawn_sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Load configuration
    let config = PushConfig::from_env().context("loading configuration")?;
    tracing::info!(addr = %config.listen_addr, "starting push-gateway");

    // Build domain, executor and service layers
    let state = AppState::from_config(&config);
    let dispatcher = state.dispatcher.clone();

    let shutdown = CancellationToken::new();
    let sweeper = config
        .sweep_interval
        .map(|interval| spawn_sweeper(dispatcher.clone(), interval, shutdown.child_token()));

    // Build router
    let app = push_gateway::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    shutdown.cancel();
    if let Some(sweeper) = sweeper
        && let Err(e) = sweeper.await
    {
        tracing::warn!(error = %e, "sweeper task failed");
    }
    dispatcher.shutdown();
    tracing::info!("push-gateway stopped");

    Ok(())
}

/// Human-readable logs by default; JSON lines when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
