// crates/engine/src/pool.rs
//! Bounded worker pool driving per-document processing for one job.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use docflow_store::JobStore;
use docflow_types::{DocumentOutcome, JobEvent};

use crate::processor::DocumentProcessor;
use crate::publisher::ProgressPublisher;
use crate::state::RunState;

/// Run `options.max_concurrency` workers over the job's document list and
/// wait for all of them to drain. Worker panics are recorded as a pool
/// fault instead of propagating.
pub(crate) async fn run_pool(
    state: Arc<RunState>,
    processor: Arc<dyn DocumentProcessor>,
    publisher: Arc<dyn ProgressPublisher>,
    store: Arc<dyn JobStore>,
) {
    let workers = state.options.max_concurrency.min(state.document_refs.len());
    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        handles.push(tokio::spawn(worker_loop(
            worker,
            Arc::clone(&state),
            Arc::clone(&processor),
            Arc::clone(&publisher),
            Arc::clone(&store),
        )));
    }

    for handle in handles {
        if let Err(err) = handle.await {
            error!(job_id = %state.job_id, "worker task panicked: {err}");
            state.set_fault(format!("worker task panicked: {err}"));
        }
    }
}

/// One worker: pull indices in order, process, record, publish.
///
/// Cancellation and stop-on-first-error are honored between dispatches; a
/// document that has been claimed always runs to completion and has its
/// outcome recorded.
async fn worker_loop(
    worker: usize,
    state: Arc<RunState>,
    processor: Arc<dyn DocumentProcessor>,
    publisher: Arc<dyn ProgressPublisher>,
    store: Arc<dyn JobStore>,
) {
    loop {
        if state.should_stop() {
            debug!(job_id = %state.job_id, worker, "worker stopping before next dispatch");
            break;
        }
        let Some(index) = state.claim_next() else {
            break;
        };
        let document_ref = state.document_refs[index].clone();
        debug!(
            job_id = %state.job_id,
            worker,
            index,
            document_ref = %document_ref,
            processor = processor.name(),
            "processing document"
        );

        let started = Instant::now();
        let outcome = match processor.process(&document_ref, &state.options).await {
            Ok(()) => {
                DocumentOutcome::success(index, &document_ref, started.elapsed().as_millis() as u64)
            }
            Err(err) => {
                warn!(
                    job_id = %state.job_id,
                    index,
                    document_ref = %document_ref,
                    "document failed: {err}"
                );
                DocumentOutcome::failure(
                    index,
                    &document_ref,
                    err.to_string(),
                    started.elapsed().as_millis() as u64,
                )
            }
        };
        let status = outcome.status;
        state.record(outcome);
        persist_snapshot(&state, store.as_ref()).await;

        // One event per document, after the snapshot so subscribers reading
        // back through the store see at least this document recorded. The
        // slot claim makes re-emission impossible.
        publisher.publish(JobEvent::DocumentProcessed {
            job_id: state.job_id,
            index,
            document_ref,
            status,
        });
    }
}

/// Best-effort mid-run persistence so `get_job` reads live progress through
/// the store. The finalizer's write is authoritative; losing one of these
/// is harmless.
async fn persist_snapshot(state: &RunState, store: &dyn JobStore) {
    let mut job = match store.get(state.job_id).await {
        Ok(job) => job,
        Err(err) => {
            warn!(job_id = %state.job_id, "snapshot load failed: {err}");
            return;
        }
    };
    state.apply_to(&mut job);
    if let Err(err) = store.update(job).await {
        warn!(job_id = %state.job_id, "snapshot persist failed: {err}");
    }
}
