// crates/engine/src/config.rs
//! Engine-level configuration.

use serde::Deserialize;

/// Tuning knobs for a [`BatchEngine`](crate::BatchEngine) instance.
///
/// Deserializable so an embedding service can load it from its own config
/// file; `Default` gives sensible standalone values.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Cap on jobs running concurrently across the engine. Starts beyond
    /// the cap park the job as `Queued`; it is dispatched FIFO as running
    /// jobs finish. `None` disables queueing entirely.
    pub max_active_jobs: Option<usize>,
    /// Buffer size of the bundled broadcast event channel. Slow
    /// subscribers that fall more than this many events behind see a
    /// `Lagged` error, never a blocked engine.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: None,
            event_capacity: 256,
        }
    }
}
