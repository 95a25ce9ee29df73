// crates/engine/src/processor.rs
//! DocumentProcessor trait defining the per-document processing seam.

use async_trait::async_trait;
use thiserror::Error;

use docflow_types::JobOptions;

/// Errors a document processor may report.
///
/// Both variants are recorded as a `Failed` outcome for the affected
/// document; neither fails the job unless `stop_on_first_error` is set.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Document processing failed: {message}")]
    Failed { message: String },

    #[error("Processor unavailable: {message}")]
    Unavailable { message: String },
}

impl ProcessError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Trait for per-document processors.
///
/// Implementations run OCR, classification, format extraction and similar
/// pipelines; the engine only records success/failure and timing. Any
/// extracted data is the implementation's to persist.
///
/// The engine imposes no per-document timeout; a processor that can hang
/// must bound its own work.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Process one document. The engine calls this at most once per
    /// document per job and never retries.
    async fn process(&self, document_ref: &str, options: &JobOptions) -> Result<(), ProcessError>;

    /// Processor name for logging/display (e.g. "ocr-pipeline").
    fn name(&self) -> &str;
}
