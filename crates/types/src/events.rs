// crates/types/src/events.rs
//! Lifecycle events published to the notification channel.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::job::{BatchProgress, DocumentStatus, JobId, JobStatus};

/// One job lifecycle event.
///
/// `JobStarted` and `JobFinished` are emitted exactly once per job and are
/// never dropped by the engine. `DocumentProcessed` is emitted at most once
/// per document (each worker owns its slot, so re-emission cannot happen),
/// which keeps large batches from producing event storms.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEvent {
    #[serde(rename_all = "camelCase")]
    JobStarted {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    DocumentProcessed {
        job_id: JobId,
        index: usize,
        document_ref: String,
        status: DocumentStatus,
    },
    #[serde(rename_all = "camelCase")]
    JobFinished {
        job_id: JobId,
        status: JobStatus,
        progress: BatchProgress,
    },
}

impl JobEvent {
    /// The job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            Self::JobStarted { job_id, .. }
            | Self::DocumentProcessed { job_id, .. }
            | Self::JobFinished { job_id, .. } => *job_id,
        }
    }
}
