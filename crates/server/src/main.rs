mod api;
mod auth;
mod bootstrap;
mod gemini;
mod health;
mod rate_limit;
mod state;
mod storefront;
mod sweeper;
#[cfg(test)]
mod test_support;
mod twilio;
mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use smsdesk_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use smsdesk_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap so its events are not lost.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let server = &app.config.server;
    let address = format!("{}:{}", server.bind_address, server.port);
    let grace = Duration::from_secs(server.graceful_shutdown_secs);

    let sweeper = sweeper::spawn(
        app.state.sessions.clone(),
        Duration::from_secs(app.config.conversation.sweep_interval_secs),
    );

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();
    let service =
        bootstrap::router(app.state.clone()).into_make_service_with_connect_info::<SocketAddr>();
    let serving = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move { signal.notified().await })
            .await
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        webhook_path = "/webhook/sms",
        "smsdesk-server listening"
    );

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "smsdesk-server stopping"
    );
    shutdown.notify_one();
    sweeper.abort();

    match tokio::time::timeout(grace, serving).await {
        Ok(Ok(result)) => result.context("http server failed")?,
        Ok(Err(join_error)) => return Err(join_error).context("http server task panicked"),
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            "in-flight requests did not finish within the grace period"
        ),
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
