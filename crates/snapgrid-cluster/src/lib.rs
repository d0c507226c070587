//! snapgrid-cluster: fleet membership plumbing shared by both roles.
//!
//! The coordinator uses [`client::post_json`] to deliver tasks; workers run a
//! [`NodeAgent`] that registers once and then heartbeats on a fixed period,
//! reporting the [`LocalStatus`] the task runner maintains.
//!
//! ```text
//! NodeAgent ──POST /register──▶ coordinator
//!     │
//!     └── every heartbeat_interval
//!           ├── LocalStatus::announcement()  (is_busy, last snapshot)
//!           ├── POST /heartbeat
//!           └── 400 "node not found" → POST /register again
//! ```

pub mod agent;
pub mod client;
pub mod status;

pub use agent::{AgentConfig, NodeAgent};
pub use client::{ClientError, ClientResult, JsonReply, post_json};
pub use status::LocalStatus;
