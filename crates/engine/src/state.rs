// crates/engine/src/state.rs
//! Shared per-job run state for the worker pool.
//!
//! Workers share three things: the atomic dispatch cursor, the stop/cancel
//! signals, and the results-plus-progress record behind a single lock. Each
//! worker writes only the slot whose index it claimed; the progress
//! counters live under the same lock so a reader can never observe
//! `completed != succeeded + failed`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use tokio_util::sync::CancellationToken;
use tracing::error;

use docflow_types::{
    BatchJob, BatchProgress, DocumentOutcome, DocumentStatus, JobId, JobOptions, JobStatus,
};

/// Results slots and aggregate counters, updated together.
struct RunResults {
    slots: Vec<DocumentOutcome>,
    progress: BatchProgress,
}

/// Shared state for one running job.
pub(crate) struct RunState {
    pub job_id: JobId,
    pub document_refs: Vec<String>,
    pub options: JobOptions,
    /// Next index to dispatch. Claimed indices are never re-dispatched.
    next: AtomicUsize,
    /// Set after the first failure when `stop_on_first_error` is on.
    stop: AtomicBool,
    cancel: CancellationToken,
    results: RwLock<RunResults>,
    /// Pool-level failure diagnostic (worker panic, launch fault).
    fault: RwLock<Option<String>>,
}

impl RunState {
    pub fn new(job: &BatchJob, cancel: CancellationToken) -> Self {
        let slots = job
            .document_refs
            .iter()
            .enumerate()
            .map(|(i, doc_ref)| DocumentOutcome::pending(i, doc_ref))
            .collect::<Vec<_>>();
        let progress = BatchProgress {
            total: slots.len(),
            ..BatchProgress::default()
        };
        Self {
            job_id: job.id,
            document_refs: job.document_refs.clone(),
            options: job.options.clone(),
            next: AtomicUsize::new(0),
            stop: AtomicBool::new(false),
            cancel,
            results: RwLock::new(RunResults { slots, progress }),
            fault: RwLock::new(None),
        }
    }

    /// True once workers should stop pulling new documents. Checked between
    /// dispatches only; in-flight documents always run to completion.
    pub fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.stop.load(Ordering::Relaxed)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Claim the next undispatched index, or `None` when the list is
    /// exhausted.
    pub fn claim_next(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.document_refs.len()).then_some(index)
    }

    /// Record a finished document into its slot and bump the counters.
    /// Exactly one worker ever records a given index.
    pub fn record(&self, outcome: DocumentOutcome) {
        let failed = outcome.status == DocumentStatus::Failed;
        match self.results.write() {
            Ok(mut guard) => {
                guard.progress.completed += 1;
                if failed {
                    guard.progress.failed += 1;
                } else {
                    guard.progress.succeeded += 1;
                }
                let index = outcome.index;
                guard.slots[index] = outcome;
            }
            Err(e) => error!(job_id = %self.job_id, "RwLock poisoned recording outcome: {e}"),
        }
        if failed && self.options.stop_on_first_error {
            self.stop.store(true, Ordering::Relaxed);
        }
    }

    /// Mark every still-pending slot `Skipped`. Called once the pool has
    /// drained, so no worker can race the writes.
    pub fn mark_undispatched_skipped(&self) {
        match self.results.write() {
            Ok(mut guard) => {
                for slot in &mut guard.slots {
                    if slot.status == DocumentStatus::Pending {
                        *slot = DocumentOutcome::skipped(slot.index, slot.document_ref.clone());
                    }
                }
            }
            Err(e) => error!(job_id = %self.job_id, "RwLock poisoned marking skips: {e}"),
        }
    }

    pub fn progress(&self) -> BatchProgress {
        match self.results.read() {
            Ok(guard) => guard.progress,
            Err(e) => {
                error!(job_id = %self.job_id, "RwLock poisoned reading progress: {e}");
                BatchProgress::default()
            }
        }
    }

    /// Copy the current results and progress into a job record.
    pub fn apply_to(&self, job: &mut BatchJob) {
        match self.results.read() {
            Ok(guard) => {
                job.results = guard.slots.clone();
                job.progress = guard.progress;
            }
            Err(e) => error!(job_id = %self.job_id, "RwLock poisoned snapshotting results: {e}"),
        }
    }

    pub fn set_fault(&self, message: String) {
        match self.fault.write() {
            Ok(mut guard) => *guard = Some(message),
            Err(e) => error!(job_id = %self.job_id, "RwLock poisoned writing fault: {e}"),
        }
    }

    pub fn fault(&self) -> Option<String> {
        self.fault.read().ok().and_then(|g| g.clone())
    }

    /// Pick the job's terminal status once the pool has drained.
    pub fn terminal_status(&self) -> JobStatus {
        if self.fault().is_some() {
            JobStatus::Failed
        } else if self.is_cancelled() {
            JobStatus::Cancelled
        } else if self.options.stop_on_first_error && self.progress().failed > 0 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_types::JobOptions;
    use pretty_assertions::assert_eq;

    fn make_state(n: usize, options: JobOptions) -> RunState {
        let refs = (0..n).map(|i| format!("doc-{i}")).collect();
        let job = BatchJob::new("test", "owner", refs, options).unwrap();
        RunState::new(&job, CancellationToken::new())
    }

    #[test]
    fn claim_dispatches_every_index_once() {
        let state = make_state(3, JobOptions::default());
        assert_eq!(state.claim_next(), Some(0));
        assert_eq!(state.claim_next(), Some(1));
        assert_eq!(state.claim_next(), Some(2));
        assert_eq!(state.claim_next(), None);
        assert_eq!(state.claim_next(), None);
    }

    #[test]
    fn record_keeps_progress_invariant() {
        let state = make_state(3, JobOptions::default());
        state.record(DocumentOutcome::success(0, "doc-0", 5));
        state.record(DocumentOutcome::failure(1, "doc-1", "bad scan", 2));

        let progress = state.progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.succeeded, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.completed, progress.succeeded + progress.failed);
    }

    #[test]
    fn failure_sets_stop_flag_only_with_stop_on_first_error() {
        let state = make_state(
            2,
            JobOptions {
                stop_on_first_error: true,
                ..JobOptions::default()
            },
        );
        assert!(!state.should_stop());
        state.record(DocumentOutcome::failure(0, "doc-0", "boom", 1));
        assert!(state.should_stop());

        let lenient = make_state(2, JobOptions::default());
        lenient.record(DocumentOutcome::failure(0, "doc-0", "boom", 1));
        assert!(!lenient.should_stop());
    }

    #[test]
    fn skipped_marking_leaves_recorded_slots() {
        let state = make_state(3, JobOptions::default());
        state.record(DocumentOutcome::success(0, "doc-0", 5));
        state.mark_undispatched_skipped();

        let mut job = BatchJob::new(
            "test",
            "owner",
            vec!["a".into(), "b".into(), "c".into()],
            JobOptions::default(),
        )
        .unwrap();
        state.apply_to(&mut job);
        assert_eq!(job.results[0].status, DocumentStatus::Success);
        assert_eq!(job.results[1].status, DocumentStatus::Skipped);
        assert_eq!(job.results[2].status, DocumentStatus::Skipped);
    }

    #[test]
    fn terminal_status_selection() {
        // all succeeded
        let state = make_state(1, JobOptions::default());
        state.record(DocumentOutcome::success(0, "doc-0", 1));
        assert_eq!(state.terminal_status(), JobStatus::Completed);

        // partial failure without stop-on-first-error is still Completed
        let state = make_state(2, JobOptions::default());
        state.record(DocumentOutcome::success(0, "doc-0", 1));
        state.record(DocumentOutcome::failure(1, "doc-1", "boom", 1));
        assert_eq!(state.terminal_status(), JobStatus::Completed);

        // stop-on-first-error failure is Failed
        let state = make_state(
            2,
            JobOptions {
                stop_on_first_error: true,
                ..JobOptions::default()
            },
        );
        state.record(DocumentOutcome::failure(0, "doc-0", "boom", 1));
        assert_eq!(state.terminal_status(), JobStatus::Failed);

        // cancellation wins over plain completion
        let refs = vec!["a".to_string()];
        let job = BatchJob::new("test", "owner", refs, JobOptions::default()).unwrap();
        let token = CancellationToken::new();
        let state = RunState::new(&job, token.clone());
        token.cancel();
        assert_eq!(state.terminal_status(), JobStatus::Cancelled);

        // a pool fault wins over everything
        let state = make_state(2, JobOptions::default());
        state.set_fault("worker task panicked".into());
        assert_eq!(state.terminal_status(), JobStatus::Failed);
    }
}
