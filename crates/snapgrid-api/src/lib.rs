//! snapgrid-api: the coordinator's HTTP surface.
//!
//! Workers announce themselves here; everything else the coordinator does
//! runs in background loops over the same [`Registry`].
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/register` | Add a worker, or refresh it if already known |
//! | POST | `/heartbeat` | Refresh a registered worker's liveness and status |
//!
//! Every reply is `{"message": ...}`. Malformed bodies, invalid nodes, and
//! heartbeats from unknown nodes are `400`.

pub mod handlers;

use axum::Router;
use axum::routing::post;
use snapgrid_state::Registry;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Registry,
}

/// Build the coordinator router.
pub fn build_router(registry: Registry) -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/heartbeat", post(handlers::heartbeat))
        .with_state(ApiState { registry })
}
