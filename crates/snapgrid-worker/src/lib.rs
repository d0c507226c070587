//! snapgrid-worker: the worker side of a snapgrid fleet.
//!
//! A worker exposes `POST /task`. The [`TaskRunner`] turns each descriptor
//! into at most one catch-up download (done before the reply), a background
//! launch of the workload, and a background upload loop that keeps the
//! worker's latest snapshot address current for the heartbeat agent.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/task` | Take up a task descriptor. 200 once any download finished, 400 malformed or invalid descriptor, 409 worker busy, 500 mandatory download failed |
//!
//! Every reply body is `{"message": ...}`.
//!
//! # Architecture
//!
//! ```text
//! POST /task ──▶ TaskRunner::accept()
//!                  ├── validate            (400 on failure)
//!                  ├── LocalStatus busy?   (409)
//!                  └── spawn: start()      (outlives a dropped request)
//!                        ├── Downloading: ContentStore::get()   (500 on failure)
//!                        └── Running
//!                              ├── spawn: write workload file, Launcher::launch()
//!                              └── spawn: sleep upload_grace, then every
//!                                    upload_interval ContentStore::put()
//!                                    → LocalStatus::set_last_snapshot()
//! ```
//!
//! The external collaborators sit behind the [`Launcher`] and
//! [`ContentStore`] traits; the shipped implementations shell out to
//! `docker compose` and the `ipfs` CLI.

pub mod error;
pub mod launcher;
mod process;
pub mod server;
pub mod store;
pub mod task;

pub use error::{WorkerError, WorkerResult};
pub use launcher::{ComposeLauncher, Launcher};
pub use server::build_router;
pub use store::{ContentStore, IpfsStore};
pub use task::{Accepted, TaskPhase, TaskRunner};
