// crates/engine/src/publisher.rs
//! Progress publishing seam for real-time job updates.

use tokio::sync::broadcast;

use docflow_types::JobEvent;

/// Sink for job lifecycle events.
///
/// Delivery is best-effort: implementations must not block the worker pool
/// and their failures never fail the job.
pub trait ProgressPublisher: Send + Sync {
    fn publish(&self, event: JobEvent);
}

/// Publisher backed by a `tokio::sync::broadcast` channel, suitable for
/// fanning events out to SSE/WebSocket handlers.
pub struct BroadcastPublisher {
    tx: broadcast::Sender<JobEvent>,
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all job events published through this channel.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressPublisher for BroadcastPublisher {
    fn publish(&self, event: JobEvent) {
        // Ignore send errors (no subscribers is fine).
        let _ = self.tx.send(event);
    }
}

/// Publisher that drops every event, for embedders without observers.
pub struct NullPublisher;

impl ProgressPublisher for NullPublisher {
    fn publish(&self, _event: JobEvent) {}
}
