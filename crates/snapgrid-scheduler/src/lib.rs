//! snapgrid-scheduler: periodic task dispatch from the coordinator.
//!
//! Every cycle the dispatcher re-reads the workload file, derives the task
//! flags from the coordinator's primary state, and sends the descriptor to
//! every Online, idle worker. The first worker to accept an executing task
//! while no primary is set becomes primary.
//!
//! # Architecture
//!
//! ```text
//! TaskDispatcher (every dispatch_period)
//!   ├── read workload file          (missing → skip cycle)
//!   ├── CoordinatorState snapshot   → build_descriptor()
//!   │     no primary : execute + upload, download iff a snapshot is known
//!   │     primary    : all flags off, snapshot address carried along
//!   ├── Registry::snapshot() filtered by NodeRecord::is_idle()
//!   └── POST /task to each (concurrently)
//!         └── 2xx while no primary → Registry::claim_primary()
//! ```

pub mod dispatcher;
pub mod error;

pub use dispatcher::{DispatchReport, TaskDispatcher, build_descriptor};
pub use error::{DispatchError, DispatchResult};
