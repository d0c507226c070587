//! Heartbeat monitor: background sweep over the registry.
//!
//! Each sweep applies the `OverduePolicy` to every record, removes the
//! ones judged offline, and demotes the primary if it was among them.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use snapgrid_state::{NodeAddr, Registry, epoch_secs};

use crate::overdue::{OverduePolicy, Verdict};

/// What a single sweep changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Nodes that earned an overdue mark but stay registered.
    pub overdue: Vec<NodeAddr>,
    /// Nodes judged offline and removed.
    pub removed: Vec<NodeAddr>,
    /// Set when one of the removed nodes was the primary.
    pub primary_lost: Option<NodeAddr>,
}

pub struct HeartbeatMonitor {
    registry: Registry,
    policy: OverduePolicy,
    period: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: Registry, policy: OverduePolicy) -> Self {
        Self {
            registry,
            policy,
            period: Duration::from_secs(10),
        }
    }

    /// Set the sweep period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(epoch_secs())
    }

    /// Run one sweep as if the clock read `now`.
    pub fn sweep_at(&self, now: u64) -> SweepReport {
        let mut report = SweepReport::default();

        let removed = self.registry.evict_where(|record| {
            match self.policy.assess(record, now) {
                Verdict::Fresh => false,
                Verdict::Overdue(_) => {
                    report.overdue.push(record.addr());
                    false
                }
                Verdict::Offline => true,
            }
        });

        // Registry lock is released; the coordinator lock is taken per node.
        for record in removed {
            let addr = record.addr();
            info!(%addr, overdue = record.overdue_count, "offline node removed from registry");
            if self.registry.demote_primary(&addr) {
                report.primary_lost = Some(addr.clone());
            }
            report.removed.push(addr);
        }

        report
    }

    /// Sweep every period until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = ?self.period, policy = ?self.policy, "heartbeat monitor started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.sweep();
                    if let Some(addr) = &report.primary_lost {
                        warn!(%addr, "primary went offline, next dispatch cycle will elect a new one");
                    }
                    debug!(
                        overdue = report.overdue.len(),
                        removed = report.removed.len(),
                        nodes = self.registry.len(),
                        "liveness sweep complete"
                    );
                }
                _ = shutdown.changed() => {
                    debug!("heartbeat monitor shutting down");
                    break;
                }
            }
        }
    }
}
