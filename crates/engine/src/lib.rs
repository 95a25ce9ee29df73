// crates/engine/src/lib.rs
//! Batch job processing engine for document workloads.
//!
//! Provides:
//! - `BatchEngine` — creates, starts, cancels and inspects batch jobs
//! - `DocumentProcessor` — the per-document processing seam (OCR,
//!   classification, text analysis live behind it)
//! - `ProgressPublisher` / `BroadcastPublisher` — real-time lifecycle events
//! - `EngineConfig` — engine-level tuning (global job cap, event capacity)
//!
//! Each started job runs under its own bounded worker pool
//! (`options.max_concurrency` tasks) with cooperative cancellation and
//! optional stop-on-first-error dispatch.

pub mod config;
pub mod coordinator;
mod pool;
pub mod processor;
pub mod publisher;
mod state;

pub use config::EngineConfig;
pub use coordinator::BatchEngine;
pub use processor::{DocumentProcessor, ProcessError};
pub use publisher::{BroadcastPublisher, NullPublisher, ProgressPublisher};
