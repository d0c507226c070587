//! Dispatch error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("workload file {path} unavailable: {source}")]
    WorkloadUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("delivery failed: {0}")]
    Delivery(#[from] snapgrid_cluster::ClientError),

    #[error("{addr} rejected task ({status}): {message}")]
    Rejected {
        addr: String,
        status: u16,
        message: String,
    },
}

pub type DispatchResult<T> = Result<T, DispatchError>;
