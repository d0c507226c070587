//! Coordinator mode: owns the registry and the primary.
//!
//! Runs, sharing one `Registry`:
//! 1. The heartbeat monitor (offline removal, primary loss)
//! 2. The task dispatcher (descriptor broadcast, primary claim)
//! 3. The `/register` + `/heartbeat` API

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::info;

use snapgrid_health::{HeartbeatMonitor, OverduePolicy};
use snapgrid_scheduler::TaskDispatcher;
use snapgrid_state::{CoordinatorConfig, Identity, Registry};

pub async fn run_coordinator(port: u16, config: CoordinatorConfig) -> anyhow::Result<()> {
    info!(identity = %Identity::Coordinator, "snapgrid daemon starting");

    let registry = Registry::new();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_shutdown = shutdown_rx.clone();
    let dispatch_shutdown = shutdown_rx;

    // ── Background loops ───────────────────────────────────────

    let monitor = HeartbeatMonitor::new(registry.clone(), OverduePolicy::from_config(&config))
        .with_period(config.sweep_period());
    let monitor_handle = tokio::spawn(async move {
        monitor.run(monitor_shutdown).await;
    });

    let dispatcher = TaskDispatcher::new(registry.clone(), &config);
    let dispatch_handle = tokio::spawn(async move {
        dispatcher.run(dispatch_shutdown).await;
    });

    // ── API server ─────────────────────────────────────────────

    let router = snapgrid_api::build_router(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "coordinator API starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = monitor_handle.await;
    let _ = dispatch_handle.await;

    info!("coordinator stopped");
    Ok(())
}
