// crates/types/src/error.rs
use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Errors surfaced by the engine's caller-facing operations.
///
/// Per-document processing failures are not part of this taxonomy: they are
/// recovered locally into the job's `results` slots and never reach the
/// caller of `start_job`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Job not found: {id}")]
    NotFound { id: JobId },

    #[error("Job {id} is {status}: cannot {operation}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        operation: &'static str,
    },

    #[error("Job store error: {message}")]
    Store { message: String },
}

impl JobError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(id: JobId) -> Self {
        Self::NotFound { id }
    }

    pub fn invalid_state(id: JobId, status: JobStatus, operation: &'static str) -> Self {
        Self::InvalidState {
            id,
            status,
            operation,
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}
