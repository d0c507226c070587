//! snapgrid-state: shared state and wire types for snapgrid.
//!
//! Holds the coordinator's in-memory node registry, the primary/port-offset
//! bookkeeping, the JSON bodies exchanged between coordinator and workers,
//! and the TOML configuration file format.
//!
//! # Architecture
//!
//! ```text
//! Registry (Clone, Arc-backed)
//!   ├── nodes: RwLock<HashMap<host:port, NodeRecord>>
//!   └── coordinator: Mutex<CoordinatorState>
//!       ├── primary
//!       ├── last_known_snapshot
//!       └── port_offset
//! ```
//!
//! Record mutations happen under the map lock; every read-modify-write of the
//! primary trio happens under the coordinator lock. When both are needed the
//! map lock is taken first. A primary claim holds a read guard on the map
//! while it sets the primary, so a node evicted by a sweep can never be
//! claimed afterwards.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod types;

pub use config::{CoordinatorConfig, FleetConfig, WorkerConfig};
pub use coordinator::CoordinatorState;
pub use error::{StateError, StateResult};
pub use registry::{Registration, Registry};
pub use types::*;
