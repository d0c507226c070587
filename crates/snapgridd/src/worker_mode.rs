//! Worker mode: runs workloads for a coordinator.
//!
//! The `/task` listener is bound before registering so the coordinator can
//! reach this node as soon as it knows about it.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use snapgrid_cluster::{AgentConfig, LocalStatus, NodeAgent};
use snapgrid_state::{Identity, WorkerConfig};
use snapgrid_worker::{ComposeLauncher, IpfsStore, TaskRunner};

pub async fn run_worker(
    coordinator: String,
    host: String,
    port: u16,
    config: WorkerConfig,
) -> anyhow::Result<()> {
    info!(identity = %Identity::Worker, %coordinator, "snapgrid daemon starting");
    std::fs::create_dir_all(&config.data_dir)?;

    let status = LocalStatus::new();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let heartbeat_shutdown = shutdown_rx.clone();

    // ── Task runner ────────────────────────────────────────────

    let runner = TaskRunner::new(
        status.clone(),
        Arc::new(IpfsStore::from_config(&config)),
        Arc::new(ComposeLauncher::from_config(&config)),
        config.data_dir.clone(),
        shutdown_rx,
    )
    .with_config(&config);
    info!(data_dir = %config.data_dir.display(), ipfs = %config.ipfs_api, "task runner initialized");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "task endpoint listening");

    // ── Registration + heartbeats ──────────────────────────────

    let agent_config = AgentConfig::new(coordinator, host, port)
        .with_heartbeat_interval(config.heartbeat_interval())
        .with_request_timeout(config.request_timeout());
    let agent = NodeAgent::new(agent_config, status);
    let heartbeat_handle = tokio::spawn(async move {
        agent.run(heartbeat_shutdown).await;
    });

    // ── Serve until Ctrl-C ─────────────────────────────────────

    axum::serve(listener, snapgrid_worker::build_router(runner))
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = heartbeat_handle.await;

    info!("worker stopped");
    Ok(())
}
