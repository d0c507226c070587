//! Worker-local state reported in every heartbeat.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use snapgrid_state::{NodeAnnouncement, NodeStatus};

/// Busy flag and latest uploaded snapshot, shared between the task runner
/// (writer) and the heartbeat agent (reader).
#[derive(Debug, Clone, Default)]
pub struct LocalStatus {
    busy: Arc<AtomicBool>,
    last_snapshot: Arc<RwLock<String>>,
}

impl LocalStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Set busy if currently idle. Returns false if already busy.
    pub fn try_mark_busy(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn last_snapshot(&self) -> String {
        self.last_snapshot.read().clone()
    }

    pub fn set_last_snapshot(&self, address: impl Into<String>) {
        *self.last_snapshot.write() = address.into();
    }

    /// Register/heartbeat body for this worker.
    pub fn announcement(&self, host: &str, port: u16) -> NodeAnnouncement {
        NodeAnnouncement {
            host: host.to_string(),
            port,
            status: Some(NodeStatus::Online),
            is_busy: self.is_busy(),
            last_snapshot: self.last_snapshot(),
        }
    }
}
