//! snapgrid-health: heartbeat-driven liveness for the coordinator.
//!
//! Liveness is push-only: workers heartbeat, the coordinator never probes.
//! The monitor sweeps the registry on a fixed period and escalates nodes
//! whose heartbeat has gone stale.
//!
//! # Architecture
//!
//! ```text
//! HeartbeatMonitor
//!   ├── periodic sweep over Registry records (Online only)
//!   │   ├── OverduePolicy::assess() → Fresh | Overdue | Offline
//!   │   └── Offline → removed from the registry
//!   └── removed node was primary → Registry::demote_primary()
//!       (primary cleared, port offset + 1, last snapshot kept)
//! ```
//!
//! # Escalation
//!
//! A node with `k` overdue marks earns the next one only once its heartbeat
//! is older than `overdue_period * (k + 1)`, so near-misses do not pile up
//! on consecutive sweeps. Any accepted heartbeat resets the count.

pub mod monitor;
pub mod overdue;

pub use monitor::{HeartbeatMonitor, SweepReport};
pub use overdue::{OverduePolicy, Verdict};
