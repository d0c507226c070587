//! Register and heartbeat handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use snapgrid_state::*;

use crate::ApiState;

fn message(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(MessageResponse::new(msg))).into_response()
}

fn state_error(e: &StateError) -> Response {
    message(StatusCode::BAD_REQUEST, e.to_string())
}

fn malformed(rejection: &JsonRejection) -> Response {
    debug!(error = %rejection, "malformed announcement");
    message(
        StatusCode::BAD_REQUEST,
        format!("node is invalid: {}", rejection.body_text()),
    )
}

/// POST /register
pub async fn register(
    State(state): State<ApiState>,
    payload: Result<Json<NodeAnnouncement>, JsonRejection>,
) -> impl IntoResponse {
    let Json(announcement) = match payload {
        Ok(json) => json,
        Err(rejection) => return malformed(&rejection),
    };

    match state.registry.register(&announcement) {
        Ok(Registration::New) => message(StatusCode::OK, "ok"),
        Ok(Registration::Refreshed) => message(StatusCode::OK, "node already registered"),
        Err(e) => {
            warn!(addr = %announcement.addr(), error = %e, "registration rejected");
            state_error(&e)
        }
    }
}

/// POST /heartbeat
pub async fn heartbeat(
    State(state): State<ApiState>,
    payload: Result<Json<NodeAnnouncement>, JsonRejection>,
) -> impl IntoResponse {
    let Json(announcement) = match payload {
        Ok(json) => json,
        Err(rejection) => return malformed(&rejection),
    };

    match state.registry.heartbeat(&announcement) {
        Ok(_) => message(StatusCode::OK, "ok"),
        Err(e) => {
            debug!(addr = %announcement.addr(), error = %e, "heartbeat rejected");
            state_error(&e)
        }
    }
}
