mod actor_framework;
mod domain;
mod clients;
mod error;

mod product_actor;
mod order_actor;
mod user_actor;

mod api;
mod app_system;
mod config;
mod gateway;
mod orchestrator;
mod roles;

#[cfg(test)]
mod mock_framework;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::app_system::{seed_catalog, setup_tracing, OrderSystem, SystemSettings};
use crate::config::AppConfig;
use crate::gateway::DarajaGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup tracing once for the entire application
    setup_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(bind_addr = %config.bind_addr, daraja = ?config.daraja, "Starting order reconciliation service");

    let gateway = DarajaGateway::new(config.daraja.clone()).context("building payment gateway client")?;
    let system = OrderSystem::new(SystemSettings::from(&config), Arc::new(gateway));

    if let Some(path) = &config.catalog_seed_path {
        seed_catalog(&system.product_client, path).await?;
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, api::router(system.app_state()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    system.shutdown().await?;
    info!("Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
