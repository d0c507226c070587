//! Worker HTTP surface: `POST /task`.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::debug;

use snapgrid_state::{MessageResponse, TaskDescriptor};

use crate::error::WorkerError;
use crate::task::TaskRunner;

/// Build the worker router.
pub fn build_router(runner: TaskRunner) -> Router {
    Router::new()
        .route("/task", post(task))
        .with_state(runner)
}

fn message(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(MessageResponse::new(msg))).into_response()
}

/// POST /task
///
/// Replies after any mandatory download has finished, so a non-2xx reply
/// tells the coordinator not to count this worker as running the task.
pub async fn task(
    State(runner): State<TaskRunner>,
    payload: Result<Json<TaskDescriptor>, JsonRejection>,
) -> impl IntoResponse {
    let Json(descriptor) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            debug!(error = %rejection, "malformed task");
            return message(
                StatusCode::BAD_REQUEST,
                format!("task is invalid: {}", rejection.body_text()),
            );
        }
    };

    match runner.accept(descriptor).await {
        Ok(_) => message(StatusCode::OK, "ok"),
        Err(e @ WorkerError::InvalidTask(_)) => message(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e @ WorkerError::Busy) => message(StatusCode::CONFLICT, e.to_string()),
        Err(e) => message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
