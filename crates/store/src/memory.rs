// crates/store/src/memory.rs
//! In-memory [`JobStore`] backed by a `RwLock<HashMap>`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use docflow_types::{validate_document_refs, BatchJob, JobId};

use crate::{JobStore, StoreError, StoreResult};

/// Process-local job storage. Cheap to create, safe to share behind an
/// `Arc`; records do not survive process restart.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, BatchJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs (test/introspection helper).
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: BatchJob) -> StoreResult<JobId> {
        validate_document_refs(&job.document_refs).map_err(|e| StoreError::InvalidJob {
            message: e.to_string(),
        })?;
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::Duplicate { id: job.id });
        }
        let id = job.id;
        jobs.insert(id, job);
        debug!(job_id = %id, "job record created");
        Ok(id)
    }

    async fn get(&self, id: JobId) -> StoreResult<BatchJob> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id })
    }

    async fn list_by_owner(&self, owner_id: &str) -> StoreResult<Vec<BatchJob>> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<BatchJob> = jobs
            .values()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect();
        out.sort_by_key(|j| j.created_at);
        Ok(out)
    }

    async fn list_active(&self) -> StoreResult<Vec<BatchJob>> {
        let jobs = self.jobs.read().await;
        let mut out: Vec<BatchJob> = jobs
            .values()
            .filter(|j| j.status.is_active())
            .cloned()
            .collect();
        out.sort_by_key(|j| j.created_at);
        Ok(out)
    }

    async fn update(&self, job: BatchJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job;
                Ok(())
            }
            None => Err(StoreError::NotFound { id: job.id }),
        }
    }
}
