// crates/types/src/job.rs
//! Batch job data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Maximum number of document references a single job may carry.
pub const MAX_DOCUMENTS: usize = 50;

/// Lower bound for a job's worker-pool size.
pub const MIN_CONCURRENCY: usize = 1;

/// Upper bound for a job's worker-pool size.
pub const MAX_CONCURRENCY: usize = 10;

/// Unique identifier for a batch job, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a batch job.
///
/// Transitions are monotonic: `Created → Queued → Running` and from
/// `Running` into exactly one of the three terminal states. `Queued` is
/// skipped when no global job cap defers dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Created,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Active states: dispatched or waiting for dispatch.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Per-job processing options supplied at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOptions {
    pub enable_ocr: bool,
    pub enable_classification: bool,
    pub enable_text_analysis: bool,
    /// Stop dispatching new documents after the first failure and finish
    /// the job as `Failed`. Already-dispatched documents run to completion.
    pub stop_on_first_error: bool,
    /// Worker-pool size for this job, `1..=10`.
    pub max_concurrency: usize,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            enable_ocr: true,
            enable_classification: true,
            enable_text_analysis: false,
            stop_on_first_error: false,
            max_concurrency: 4,
        }
    }
}

impl JobOptions {
    /// Check the concurrency bound.
    pub fn validate(&self) -> Result<(), JobError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.max_concurrency) {
            return Err(JobError::invalid_argument(format!(
                "maxConcurrency must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}, got {}",
                self.max_concurrency
            )));
        }
        Ok(())
    }
}

/// Status of one document within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentStatus {
    /// Slot allocated, document not yet dispatched.
    Pending,
    Success,
    Failed,
    /// Never dispatched: the job was cancelled or stopped on an earlier error.
    Skipped,
}

/// Recorded result for one document within a job.
///
/// `results[i]` always corresponds to `document_refs[i]`; exactly one worker
/// ever writes a given slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentOutcome {
    pub index: usize,
    pub document_ref: String,
    pub status: DocumentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl DocumentOutcome {
    /// Pre-allocated slot for a document that has not been dispatched yet.
    pub fn pending(index: usize, document_ref: impl Into<String>) -> Self {
        Self {
            index,
            document_ref: document_ref.into(),
            status: DocumentStatus::Pending,
            error_message: None,
            processing_time_ms: None,
        }
    }

    pub fn success(index: usize, document_ref: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            index,
            document_ref: document_ref.into(),
            status: DocumentStatus::Success,
            error_message: None,
            processing_time_ms: Some(elapsed_ms),
        }
    }

    pub fn failure(
        index: usize,
        document_ref: impl Into<String>,
        message: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            index,
            document_ref: document_ref.into(),
            status: DocumentStatus::Failed,
            error_message: Some(message.into()),
            processing_time_ms: Some(elapsed_ms),
        }
    }

    pub fn skipped(index: usize, document_ref: impl Into<String>) -> Self {
        Self {
            index,
            document_ref: document_ref.into(),
            status: DocumentStatus::Skipped,
            error_message: None,
            processing_time_ms: None,
        }
    }
}

/// Aggregate progress counters for a job.
///
/// `completed == succeeded + failed` at every observable snapshot; skipped
/// documents are counted in none of the three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// A batch job: a bounded list of document references processed together
/// under shared options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: JobId,
    pub name: String,
    /// Identity of the creator. Recorded and exposed for the calling layer's
    /// access checks; not enforced inside the engine.
    pub owner_id: String,
    pub status: JobStatus,
    pub options: JobOptions,
    pub document_refs: Vec<String>,
    /// One slot per `document_refs` entry, pre-allocated when the job starts.
    pub results: Vec<DocumentOutcome>,
    pub progress: BatchProgress,
    /// Job-level diagnostic, set only when the job itself fails to run
    /// (pool launch failure, worker panic). Per-document errors live in
    /// `results`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl BatchJob {
    /// Create a job in `Created` status with a fresh id.
    ///
    /// Fails with `JobError::InvalidArgument` when the document list is
    /// empty or longer than [`MAX_DOCUMENTS`], or when the options are out
    /// of range.
    pub fn new(
        name: impl Into<String>,
        owner_id: impl Into<String>,
        document_refs: Vec<String>,
        options: JobOptions,
    ) -> Result<Self, JobError> {
        validate_document_refs(&document_refs)?;
        options.validate()?;
        let total = document_refs.len();
        Ok(Self {
            id: JobId::new(),
            name: name.into(),
            owner_id: owner_id.into(),
            status: JobStatus::Created,
            options,
            document_refs,
            results: Vec::new(),
            progress: BatchProgress {
                total,
                ..BatchProgress::default()
            },
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        })
    }
}

/// Validate the document-ref list bounds (`1..=MAX_DOCUMENTS`).
pub fn validate_document_refs(refs: &[String]) -> Result<(), JobError> {
    if refs.is_empty() {
        return Err(JobError::invalid_argument(
            "document list must not be empty",
        ));
    }
    if refs.len() > MAX_DOCUMENTS {
        return Err(JobError::invalid_argument(format!(
            "document list exceeds {MAX_DOCUMENTS} entries (got {})",
            refs.len()
        )));
    }
    Ok(())
}
