//! Task dispatcher: builds the per-cycle descriptor and broadcasts it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use snapgrid_cluster::post_json;
use snapgrid_state::{
    CoordinatorConfig, CoordinatorState, NodeAddr, NodeRecord, Registry, SnapshotRef,
    TaskDescriptor, WorkloadSpec,
};

use crate::error::{DispatchError, DispatchResult};

/// Derive the task flags from the primary state.
///
/// With no primary every recipient is asked to execute and upload, and to
/// catch up first if a snapshot from a previous primary is known. With a
/// primary the descriptor is informational only.
pub fn build_descriptor(
    content: String,
    filename: &str,
    base_port: u16,
    state: &CoordinatorState,
) -> TaskDescriptor {
    let leaderless = state.primary.is_none();
    TaskDescriptor {
        need_download: leaderless && !state.last_known_snapshot.is_empty(),
        need_execute: leaderless,
        need_upload: leaderless,
        primary: state.primary.clone().unwrap_or_default(),
        workload: WorkloadSpec {
            content,
            filename: filename.to_string(),
            port: base_port.saturating_add(state.port_offset),
        },
        snapshot: SnapshotRef {
            cid: state.last_known_snapshot.clone(),
            filename: String::new(),
        },
    }
}

/// What one dispatch cycle did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Workers the descriptor was sent to.
    pub eligible: usize,
    pub delivered: Vec<NodeAddr>,
    pub failed: Vec<NodeAddr>,
    /// Worker that became primary during this cycle.
    pub claimed: Option<NodeAddr>,
}

pub struct TaskDispatcher {
    registry: Registry,
    workload_file: PathBuf,
    base_port: u16,
    period: Duration,
    task_timeout: Duration,
}

impl TaskDispatcher {
    pub fn new(registry: Registry, config: &CoordinatorConfig) -> Self {
        Self {
            registry,
            workload_file: config.workload_file.clone(),
            base_port: config.base_port,
            period: config.dispatch_period(),
            task_timeout: config.task_timeout(),
        }
    }

    /// Records a cycle may target: Online and not busy.
    pub fn eligible(&self) -> Vec<NodeRecord> {
        self.registry
            .snapshot()
            .into_iter()
            .filter(NodeRecord::is_idle)
            .collect()
    }

    /// Run a single dispatch cycle.
    ///
    /// Only an unreadable workload file is an error; per-worker failures are
    /// logged and counted in the report.
    pub async fn dispatch_once(&self) -> DispatchResult<DispatchReport> {
        let content = tokio::fs::read_to_string(&self.workload_file)
            .await
            .map_err(|source| DispatchError::WorkloadUnavailable {
                path: self.workload_file.clone(),
                source,
            })?;

        let state = self.registry.coordinator();
        let descriptor = Arc::new(build_descriptor(
            content,
            &workload_file_name(&self.workload_file),
            self.base_port,
            &state,
        ));

        let targets = self.eligible();
        let mut report = DispatchReport {
            eligible: targets.len(),
            ..Default::default()
        };
        if targets.is_empty() {
            debug!("no idle workers, nothing to dispatch");
            return Ok(report);
        }

        let mut deliveries = JoinSet::new();
        for record in targets {
            let descriptor = Arc::clone(&descriptor);
            let timeout = self.task_timeout;
            deliveries.spawn(async move {
                let addr = record.addr();
                let result = deliver(&addr, &descriptor, timeout).await;
                (addr, result)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            let (addr, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "delivery task panicked");
                    continue;
                }
            };
            match result {
                Ok(()) => {
                    debug!(%addr, execute = descriptor.need_execute, "task delivered");
                    // Standby descriptors never confer primacy.
                    if descriptor.need_execute && self.registry.claim_primary(&addr) {
                        report.claimed = Some(addr.clone());
                    }
                    report.delivered.push(addr);
                }
                Err(e) => {
                    warn!(%addr, error = %e, "task delivery failed");
                    report.failed.push(addr);
                }
            }
        }

        info!(
            port = descriptor.target_port(),
            download = descriptor.need_download,
            execute = descriptor.need_execute,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            primary = ?self.registry.coordinator().primary,
            "dispatch cycle complete"
        );
        Ok(report)
    }

    /// Dispatch every period until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            period = ?self.period,
            workload = %self.workload_file.display(),
            "task dispatcher started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_once().await {
                        warn!(error = %e, "dispatch cycle skipped");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("task dispatcher shutting down");
                    break;
                }
            }
        }
    }
}

async fn deliver(addr: &str, descriptor: &TaskDescriptor, timeout: Duration) -> DispatchResult<()> {
    let reply = post_json(addr, "/task", descriptor, timeout).await?;
    if reply.is_success() {
        Ok(())
    } else {
        Err(DispatchError::Rejected {
            addr: addr.to_string(),
            status: reply.status.as_u16(),
            message: reply.message,
        })
    }
}

/// Name the worker should write the workload under.
fn workload_file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "compose.yaml".to_string())
}
