//! Primary designation bookkeeping.
//!
//! `CoordinatorState` is the trio the coordinator must update atomically:
//! who the primary is, the newest snapshot the primary reported, and the
//! port offset bumped on every primary loss. The `Registry` wraps it in a
//! single mutex; the methods here are the only mutations.

use tracing::{info, warn};

use crate::types::NodeAddr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorState {
    /// Worker whose snapshots are authoritative, if any.
    pub primary: Option<NodeAddr>,
    /// Newest content address reported by a primary. Survives primary loss.
    pub last_known_snapshot: String,
    /// Added to the base port so a replacement primary avoids a stuck one.
    pub port_offset: u16,
}

impl CoordinatorState {
    pub fn is_primary(&self, addr: &str) -> bool {
        self.primary.as_deref() == Some(addr)
    }

    /// Award primacy to `addr` if nobody holds it. Returns whether it stuck.
    pub fn claim_primary(&mut self, addr: &str) -> bool {
        if self.primary.is_some() {
            return false;
        }
        self.primary = Some(addr.to_string());
        info!(%addr, "worker designated primary");
        true
    }

    /// Clear primacy if `addr` holds it, bumping the port offset.
    pub fn demote(&mut self, addr: &str) -> bool {
        if !self.is_primary(addr) {
            return false;
        }
        self.primary = None;
        self.port_offset = self.port_offset.wrapping_add(1);
        warn!(
            %addr,
            port_offset = self.port_offset,
            last_known_snapshot = %self.last_known_snapshot,
            "primary lost"
        );
        true
    }

    /// Take `snapshot` as the newest authoritative address when `addr` is primary.
    ///
    /// Empty addresses are ignored: a fresh primary heartbeats before its
    /// first upload and must not erase the catch-up reference.
    pub fn record_snapshot(&mut self, addr: &str, snapshot: &str) -> bool {
        if !self.is_primary(addr) || snapshot.is_empty() || snapshot == self.last_known_snapshot {
            return false;
        }
        self.last_known_snapshot = snapshot.to_string();
        info!(%addr, snapshot, "primary snapshot updated");
        true
    }
}
