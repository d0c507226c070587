//! Error types for registry and wire validation.

use thiserror::Error;

/// Result type alias for registry operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while validating or applying node and task messages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("node not found, you may need to register first: {0}")]
    NotRegistered(String),

    #[error("invalid node: {0}")]
    InvalidNode(String),

    #[error("invalid task: {0}")]
    InvalidTask(String),
}
