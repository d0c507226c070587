//! Worker error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("task is invalid: {0}")]
    InvalidTask(#[from] snapgrid_state::StateError),

    #[error("worker is busy")]
    Busy,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("{program} exited with {code}: {stderr}")]
    CommandFailed {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("task start interrupted: {0}")]
    Interrupted(#[from] tokio::task::JoinError),

    #[error("content store returned an empty address for {0}")]
    EmptyAddress(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
