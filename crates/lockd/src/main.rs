//! lockd — lock fleet daemon.
//!
//! Accepts device WebSockets, keeps the directory in step with who is
//! connected, and routes commands from the HTTP API to individual locks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use lockd_core::config::LockdConfig;
use lockd_core::{SharedClock, SystemClock};
use lockd_services::{
    open_directory, CommandRouter, ConnectionRegistry, LivenessMonitor, TaskScheduler,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = LockdConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = LockdConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        LockdConfig::default()
    });
    tracing::info!(
        device_port = config.network.device_port,
        api_port = config.network.api_port,
        heartbeat_secs = config.liveness.heartbeat_secs,
        "lockd starting"
    );

    // Shared state
    let directory = open_directory(&config.storage).context("failed to open device directory")?;
    tracing::info!(backend = ?config.storage.backend, "device directory ready");

    let registry = ConnectionRegistry::new();
    let scheduler = TaskScheduler::new();
    let clock: SharedClock = Arc::new(SystemClock);

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let monitor_task = tokio::spawn(
        LivenessMonitor::new(
            directory.clone(),
            registry.clone(),
            scheduler.clone(),
            clock.clone(),
            config.liveness.heartbeat(),
        )
        .run(shutdown_tx.subscribe()),
    );

    let device_addr: SocketAddr = format!("{}:{}", config.network.bind_addr, config.network.device_port)
        .parse()
        .context("invalid network.bind_addr")?;
    let gateway_task = {
        let state = lockd_api::GatewayState {
            directory: directory.clone(),
            registry: registry.clone(),
            clock: clock.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = lockd_api::serve_devices(state, device_addr).await {
                tracing::error!(error = %e, "device gateway failed");
            }
        })
    };

    let api_port = config.network.api_port;
    let api_task = {
        let router = CommandRouter::new(
            directory.clone(),
            registry.clone(),
            scheduler.clone(),
            clock.clone(),
            config.liveness.removal_grace(),
        );
        let state = lockd_api::ApiState {
            directory: directory.clone(),
            registry: registry.clone(),
            router,
            clock: clock.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = lockd_api::serve(state, api_port).await {
                tracing::error!(error = %e, "API server failed");
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();
    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = monitor_task       => tracing::error!("liveness monitor exited: {:?}", r),
        r = gateway_task       => tracing::error!("device gateway exited: {:?}", r),
        r = api_task           => tracing::error!("API server exited: {:?}", r),
    }

    let open = registry.len();
    let left = registry.close_all(Duration::from_secs(2)).await;
    if left == 0 {
        tracing::info!(connections = open, "device connections closed");
    } else {
        tracing::warn!(connections = open, still_open = left, "device connections did not all close in time");
    }
    Ok(())
}
