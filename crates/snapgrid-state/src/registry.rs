//! Registry: the coordinator's authoritative table of workers.
//!
//! Cheap to clone and shared by the HTTP handlers, the heartbeat monitor,
//! and the task dispatcher. Records are keyed by `host:port`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::coordinator::CoordinatorState;
use crate::error::{StateError, StateResult};
use crate::types::*;

/// Outcome of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new record was inserted.
    New,
    /// The worker was already known; treated as a heartbeat.
    Refreshed,
}

/// Thread-safe node registry plus the coordinator's primary state.
#[derive(Clone, Default)]
pub struct Registry {
    nodes: Arc<RwLock<HashMap<NodeAddr, NodeRecord>>>,
    coordinator: Arc<Mutex<CoordinatorState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Records ────────────────────────────────────────────────────

    /// Register a worker, or refresh it if already known.
    pub fn register(&self, announcement: &NodeAnnouncement) -> StateResult<Registration> {
        self.register_at(announcement, epoch_secs())
    }

    /// `register` with an explicit clock, for sweeps driven by tests.
    pub fn register_at(
        &self,
        announcement: &NodeAnnouncement,
        now: u64,
    ) -> StateResult<Registration> {
        announcement.validate()?;
        let addr = announcement.addr();
        {
            let mut nodes = self.nodes.write();
            match nodes.get_mut(&addr) {
                Some(record) => record.refresh(announcement, now),
                None => {
                    nodes.insert(addr.clone(), NodeRecord::from_announcement(announcement, now));
                    info!(%addr, busy = announcement.is_busy, "node registered");
                    return Ok(Registration::New);
                }
            }
        }
        self.track_primary_snapshot(&addr, &announcement.last_snapshot);
        debug!(%addr, "node already registered, refreshed");
        Ok(Registration::Refreshed)
    }

    /// Accept a heartbeat from a registered worker.
    ///
    /// Never creates a record. Returns the refreshed record.
    pub fn heartbeat(&self, announcement: &NodeAnnouncement) -> StateResult<NodeRecord> {
        self.heartbeat_at(announcement, epoch_secs())
    }

    pub fn heartbeat_at(
        &self,
        announcement: &NodeAnnouncement,
        now: u64,
    ) -> StateResult<NodeRecord> {
        announcement.validate()?;
        let addr = announcement.addr();
        let record = {
            let mut nodes = self.nodes.write();
            let record = nodes
                .get_mut(&addr)
                .ok_or_else(|| StateError::NotRegistered(addr.clone()))?;
            record.refresh(announcement, now);
            record.clone()
        };
        self.track_primary_snapshot(&addr, &record.last_snapshot);
        debug!(%addr, busy = record.is_busy, "heartbeat accepted");
        Ok(record)
    }

    /// Copy of every current record. Order is unspecified.
    pub fn snapshot(&self) -> Vec<NodeRecord> {
        let nodes = self.nodes.read();
        nodes.values().cloned().collect()
    }

    pub fn get(&self, addr: &str) -> Option<NodeRecord> {
        let nodes = self.nodes.read();
        nodes.get(addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visit every record mutably and remove those for which `evict` returns true.
    ///
    /// Returns the removed records. The coordinator lock is not taken here;
    /// callers demote after the map lock is released.
    pub fn evict_where<F>(&self, mut evict: F) -> Vec<NodeRecord>
    where
        F: FnMut(&mut NodeRecord) -> bool,
    {
        let mut nodes = self.nodes.write();
        let mut removed = Vec::new();
        nodes.retain(|_, record| {
            if evict(record) {
                removed.push(record.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    // ── Primary ────────────────────────────────────────────────────

    /// Copy of the primary trio.
    pub fn coordinator(&self) -> CoordinatorState {
        self.coordinator.lock().clone()
    }

    /// Atomically claim primacy for `addr` if none is set and `addr` is
    /// still registered.
    ///
    /// The map read lock is held across the claim so an eviction cannot
    /// slip between the membership check and the write. Lock order is
    /// always map, then coordinator.
    pub fn claim_primary(&self, addr: &str) -> bool {
        let nodes = self.nodes.read();
        if !nodes.contains_key(addr) {
            debug!(%addr, "claim ignored, node is no longer registered");
            return false;
        }
        self.coordinator.lock().claim_primary(addr)
    }

    /// Clear primacy if `addr` holds it, bumping the port offset.
    pub fn demote_primary(&self, addr: &str) -> bool {
        self.coordinator.lock().demote(addr)
    }

    fn track_primary_snapshot(&self, addr: &str, snapshot: &str) {
        self.coordinator.lock().record_snapshot(addr, snapshot);
    }
}
