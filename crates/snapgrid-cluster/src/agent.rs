//! Node agent: worker-side registration and heartbeat loop.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use snapgrid_state::{NodeAddr, node_addr};

use crate::client::{ClientResult, JsonReply, post_json};
use crate::status::LocalStatus;

/// Prefix of the coordinator's reply to a heartbeat from an unknown node.
const NOT_REGISTERED_PREFIX: &str = "node not found";

/// Configuration for the node agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// `host:port` of the coordinator's HTTP listener.
    pub coordinator_addr: String,
    /// This worker's advertised host.
    pub host: String,
    /// This worker's advertised (and listen) port.
    pub port: u16,
    pub heartbeat_interval: Duration,
    pub request_timeout: Duration,
}

impl AgentConfig {
    pub fn new(coordinator_addr: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            coordinator_addr: coordinator_addr.into(),
            host: host.into(),
            port,
            heartbeat_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Keeps one worker known to the coordinator.
pub struct NodeAgent {
    config: AgentConfig,
    status: LocalStatus,
}

impl NodeAgent {
    pub fn new(config: AgentConfig, status: LocalStatus) -> Self {
        Self { config, status }
    }

    pub fn addr(&self) -> NodeAddr {
        node_addr(&self.config.host, self.config.port)
    }

    /// Send one registration carrying the current local status.
    pub async fn register(&self) -> ClientResult<JsonReply> {
        self.send("/register").await
    }

    /// Send one heartbeat carrying the current local status.
    pub async fn heartbeat(&self) -> ClientResult<JsonReply> {
        self.send("/heartbeat").await
    }

    /// Register, then heartbeat every interval until `shutdown` flips.
    ///
    /// Failures are logged and retried on the next tick. A heartbeat the
    /// coordinator rejects as unregistered triggers an immediate
    /// re-registration.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let addr = self.addr();
        self.try_register().await;

        info!(
            %addr,
            coordinator = %self.config.coordinator_addr,
            interval = ?self.config.heartbeat_interval,
            "heartbeat loop started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.heartbeat_interval) => {
                    self.beat_once().await;
                }
                _ = shutdown.changed() => {
                    info!(%addr, "heartbeat loop shutting down");
                    break;
                }
            }
        }
    }

    async fn try_register(&self) {
        let addr = self.addr();
        match self.register().await {
            Ok(reply) if reply.is_success() => {
                info!(%addr, message = %reply.message, "registered with coordinator");
            }
            Ok(reply) => {
                warn!(%addr, status = %reply.status, message = %reply.message, "registration rejected");
            }
            Err(e) => {
                warn!(%addr, error = %e, "registration failed");
            }
        }
    }

    async fn beat_once(&self) {
        let addr = self.addr();
        match self.heartbeat().await {
            Ok(reply) if reply.is_success() => {
                debug!(%addr, busy = self.status.is_busy(), "heartbeat sent");
            }
            Ok(reply) if is_not_registered(&reply) => {
                warn!(%addr, message = %reply.message, "coordinator does not know this node, re-registering");
                self.try_register().await;
            }
            Ok(reply) => {
                warn!(%addr, status = %reply.status, message = %reply.message, "heartbeat rejected");
            }
            Err(e) => {
                warn!(%addr, error = %e, "heartbeat failed");
            }
        }
    }

    async fn send(&self, path: &str) -> ClientResult<JsonReply> {
        let body = self.status.announcement(&self.config.host, self.config.port);
        post_json(
            &self.config.coordinator_addr,
            path,
            &body,
            self.config.request_timeout,
        )
        .await
    }
}

fn is_not_registered(reply: &JsonReply) -> bool {
    reply.status == http::StatusCode::BAD_REQUEST && reply.message.starts_with(NOT_REGISTERED_PREFIX)
}
