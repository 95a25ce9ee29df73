// crates/store/src/lib.rs
//! Keyed storage for batch job records.
//!
//! The engine talks to storage only through the [`JobStore`] trait so an
//! embedding service can swap the bundled in-memory map for a persistent
//! backend without touching the coordinator.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use docflow_types::{BatchJob, JobId};

pub use memory::MemoryJobStore;

/// Errors from job storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {id}")]
    NotFound { id: JobId },

    #[error("Job already exists: {id}")]
    Duplicate { id: JobId },

    #[error("Invalid job record: {message}")]
    InvalidJob { message: String },

    /// Backend fault (connection loss, serialization, ...) in persistent
    /// implementations. The in-memory store never produces this.
    #[error("Store backend error: {message}")]
    Backend { message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for docflow_types::JobError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => Self::not_found(id),
            StoreError::InvalidJob { message } => Self::invalid_argument(message),
            other => Self::store(other.to_string()),
        }
    }
}

/// Concurrency-safe CRUD for [`BatchJob`] records.
///
/// All operations fail fast with [`StoreError::NotFound`] for unknown ids;
/// no partial writes are visible across this boundary. Callers of `update`
/// must have exclusive intent on the specific job: for a running job that
/// is the coordinator and the job's own workers, which converge because
/// every snapshot they write is assembled from the same shared run state.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record and return its id.
    ///
    /// Rejects records with an out-of-bounds document list and duplicate ids.
    async fn create(&self, job: BatchJob) -> StoreResult<JobId>;

    /// Fetch a snapshot of one job.
    async fn get(&self, id: JobId) -> StoreResult<BatchJob>;

    /// All jobs created by the given owner.
    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<BatchJob>>;

    /// Jobs in `Queued` or `Running` status.
    async fn list_active(&self) -> StoreResult<Vec<BatchJob>>;

    /// Atomically replace an existing record.
    async fn update(&self, job: BatchJob) -> StoreResult<()>;
}
