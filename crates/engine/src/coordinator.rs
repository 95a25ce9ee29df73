// crates/engine/src/coordinator.rs
//! Batch coordinator: owns the job state machine from `start` to a
//! terminal state.
//!
//! The coordinator is the sole writer of `status`, `started_at` and
//! `completed_at`. Workers write their own results slots and the shared
//! progress counters; everything else goes through here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use docflow_store::JobStore;
use docflow_types::{
    BatchJob, BatchProgress, DocumentOutcome, DocumentStatus, JobError, JobEvent, JobId,
    JobOptions, JobStatus,
};

use crate::config::EngineConfig;
use crate::pool;
use crate::processor::DocumentProcessor;
use crate::publisher::{BroadcastPublisher, ProgressPublisher};
use crate::state::RunState;

/// Kept per running job: the cancellation token plus the supervisor task
/// watching the pool driver. The supervisor handle is `None` once a
/// `wait_for` caller has claimed it.
struct RunHandle {
    cancel: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

struct EngineInner {
    store: Arc<dyn JobStore>,
    processor: Arc<dyn DocumentProcessor>,
    publisher: Arc<dyn ProgressPublisher>,
    config: EngineConfig,
    /// Jobs with an attached worker pool. Entries are removed by the
    /// supervisor once the job reaches a terminal state.
    running: Mutex<HashMap<JobId, RunHandle>>,
}

/// The batch engine facade. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct BatchEngine {
    inner: Arc<EngineInner>,
}

impl BatchEngine {
    pub fn new(
        store: Arc<dyn JobStore>,
        processor: Arc<dyn DocumentProcessor>,
        publisher: Arc<dyn ProgressPublisher>,
        config: EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                processor,
                publisher,
                config,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Engine wired to the bundled broadcast publisher. The returned
    /// publisher handle is what callers `subscribe()` on.
    pub fn with_broadcast(
        store: Arc<dyn JobStore>,
        processor: Arc<dyn DocumentProcessor>,
        config: EngineConfig,
    ) -> (Self, Arc<BroadcastPublisher>) {
        let publisher = Arc::new(BroadcastPublisher::with_capacity(config.event_capacity));
        let engine = Self::new(
            store,
            processor,
            publisher.clone() as Arc<dyn ProgressPublisher>,
            config,
        );
        (engine, publisher)
    }

    /// Validate and persist a new job in `Created` status.
    pub async fn create_job(
        &self,
        name: impl Into<String>,
        owner_id: impl Into<String>,
        document_refs: Vec<String>,
        options: JobOptions,
    ) -> Result<JobId, JobError> {
        let job = BatchJob::new(name, owner_id, document_refs, options)?;
        let id = self.inner.store.create(job).await?;
        info!(job_id = %id, "batch job created");
        Ok(id)
    }

    /// Transition a `Created`/`Queued` job to `Running` and launch its
    /// worker pool, or park it as `Queued` when the engine is at its
    /// global job cap. Returns as soon as the pool is spawned; processing
    /// continues in the background under supervision.
    pub async fn start_job(&self, id: JobId) -> Result<(), JobError> {
        let mut running = self.inner.running.lock().await;
        let job = self.inner.store.get(id).await?;
        match job.status {
            JobStatus::Created | JobStatus::Queued => {}
            status => return Err(JobError::invalid_state(id, status, "start")),
        }
        if running.contains_key(&id) {
            // start raced with itself; the first caller won
            return Err(JobError::invalid_state(id, job.status, "start"));
        }

        if let Some(cap) = self.inner.config.max_active_jobs {
            if running.len() >= cap {
                if job.status != JobStatus::Queued {
                    let mut parked = job;
                    parked.status = JobStatus::Queued;
                    self.inner.store.update(parked).await?;
                }
                info!(job_id = %id, cap, "engine at capacity, job queued");
                return Ok(());
            }
        }

        Arc::clone(&self.inner).spawn_run(job, &mut running).await
    }

    /// Request cooperative cancellation. A running job stops dispatching
    /// new documents and finishes as `Cancelled` once in-flight documents
    /// complete; a job that never dispatched goes terminal immediately.
    pub async fn cancel_job(&self, id: JobId) -> Result<(), JobError> {
        let running = self.inner.running.lock().await;
        let job = self.inner.store.get(id).await?;
        if job.status.is_terminal() {
            return Err(JobError::invalid_state(id, job.status, "cancel"));
        }
        if let Some(handle) = running.get(&id) {
            handle.cancel.cancel();
            info!(job_id = %id, "cancellation requested");
            return Ok(());
        }
        drop(running);
        self.inner.cancel_undispatched(job).await
    }

    /// Snapshot of one job, live progress included.
    pub async fn get_job(&self, id: JobId) -> Result<BatchJob, JobError> {
        Ok(self.inner.store.get(id).await?)
    }

    pub async fn list_jobs_by_owner(&self, owner_id: &str) -> Result<Vec<BatchJob>, JobError> {
        Ok(self.inner.store.list_by_owner(owner_id).await?)
    }

    pub async fn list_active_jobs(&self) -> Result<Vec<BatchJob>, JobError> {
        Ok(self.inner.store.list_active().await?)
    }

    /// Block until a started (or queued) job reaches a terminal state and
    /// return the final record. `start_job` itself never blocks on
    /// completion; this is the optional await half of the start handle.
    ///
    /// Fails with `InvalidState` for a job that was never started.
    pub async fn wait_for(&self, id: JobId) -> Result<BatchJob, JobError> {
        let handle = {
            let mut running = self.inner.running.lock().await;
            running.get_mut(&id).and_then(|h| h.supervisor.take())
        };
        match handle {
            Some(handle) => {
                if let Err(err) = handle.await {
                    error!(job_id = %id, "supervisor task failed: {err}");
                }
                Ok(self.inner.store.get(id).await?)
            }
            None => {
                // Another waiter holds the handle, or the job is queued for
                // dispatch: fall back to polling the store.
                loop {
                    let job = self.inner.store.get(id).await?;
                    if job.status.is_terminal() {
                        return Ok(job);
                    }
                    if job.status == JobStatus::Created {
                        return Err(JobError::invalid_state(id, job.status, "wait"));
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }
    }
}

impl EngineInner {
    /// Persist the `Running` transition, pre-allocate results, publish
    /// `JobStarted` and spawn the supervised pool driver. The `running`
    /// guard is held by the caller so two starts cannot race.
    async fn spawn_run(
        self: Arc<Self>,
        mut job: BatchJob,
        running: &mut HashMap<JobId, RunHandle>,
    ) -> Result<(), JobError> {
        let started_at = Utc::now();
        job.status = JobStatus::Running;
        job.started_at = Some(started_at);
        job.results = job
            .document_refs
            .iter()
            .enumerate()
            .map(|(i, doc_ref)| DocumentOutcome::pending(i, doc_ref))
            .collect();
        job.progress = BatchProgress {
            total: job.document_refs.len(),
            ..BatchProgress::default()
        };
        self.store.update(job.clone()).await?;

        let cancel = CancellationToken::new();
        let state = Arc::new(RunState::new(&job, cancel.clone()));

        self.publisher.publish(JobEvent::JobStarted {
            job_id: job.id,
            timestamp: started_at,
        });
        info!(
            job_id = %job.id,
            documents = job.document_refs.len(),
            workers = job.options.max_concurrency,
            "batch job started"
        );

        let driver = tokio::spawn({
            let inner = Arc::clone(&self);
            let state = Arc::clone(&state);
            async move {
                pool::run_pool(
                    Arc::clone(&state),
                    Arc::clone(&inner.processor),
                    Arc::clone(&inner.publisher),
                    Arc::clone(&inner.store),
                )
                .await;
                inner.finalize(&state).await;
            }
        });
        let supervisor = tokio::spawn({
            let inner = Arc::clone(&self);
            let id = job.id;
            async move { inner.supervise(id, driver).await }
        });

        running.insert(
            job.id,
            RunHandle {
                cancel,
                supervisor: Some(supervisor),
            },
        );
        Ok(())
    }

    /// Drain-time bookkeeping: mark undispatched slots, pick the terminal
    /// status, persist, publish `JobFinished`.
    async fn finalize(&self, state: &RunState) {
        state.mark_undispatched_skipped();
        let status = state.terminal_status();
        match self.store.get(state.job_id).await {
            Ok(mut job) => {
                state.apply_to(&mut job);
                job.status = status;
                job.completed_at = Some(Utc::now());
                job.error_message = state.fault();
                let progress = job.progress;
                if let Err(err) = self.store.update(job).await {
                    error!(job_id = %state.job_id, "failed to persist terminal state: {err}");
                }
                self.publisher.publish(JobEvent::JobFinished {
                    job_id: state.job_id,
                    status,
                    progress,
                });
                info!(
                    job_id = %state.job_id,
                    %status,
                    completed = progress.completed,
                    failed = progress.failed,
                    "batch job finished"
                );
            }
            Err(err) => {
                error!(job_id = %state.job_id, "failed to load job for finalization: {err}")
            }
        }
    }

    /// Watch the driver task: a panic there must surface as a `Failed` job,
    /// never vanish. Afterwards free the running slot and dispatch the
    /// oldest queued job, if any.
    fn supervise(
        self: Arc<Self>,
        id: JobId,
        driver: JoinHandle<()>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            if let Err(err) = driver.await {
                error!(job_id = %id, "job driver task failed: {err}");
                self.fail_job_record(id, format!("worker pool task failed: {err}"))
                    .await;
            }
            self.running.lock().await.remove(&id);
            self.dispatch_queued().await;
        })
    }

    /// Force a non-terminal job record into `Failed` with a diagnostic.
    async fn fail_job_record(&self, id: JobId, message: String) {
        match self.store.get(id).await {
            Ok(mut job) if !job.status.is_terminal() => {
                job.status = JobStatus::Failed;
                job.error_message = Some(message);
                job.completed_at = Some(Utc::now());
                for slot in &mut job.results {
                    if slot.status == DocumentStatus::Pending {
                        *slot = DocumentOutcome::skipped(slot.index, slot.document_ref.clone());
                    }
                }
                let progress = job.progress;
                if let Err(err) = self.store.update(job).await {
                    error!(job_id = %id, "failed to persist failure record: {err}");
                }
                self.publisher.publish(JobEvent::JobFinished {
                    job_id: id,
                    status: JobStatus::Failed,
                    progress,
                });
            }
            Ok(_) => {}
            Err(err) => error!(job_id = %id, "failed to load job for failure record: {err}"),
        }
    }

    /// Terminal transition for a job that never got a pool (`Created` or
    /// `Queued`): every document is `Skipped`, nothing was attempted.
    async fn cancel_undispatched(&self, mut job: BatchJob) -> Result<(), JobError> {
        let id = job.id;
        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        if job.results.is_empty() {
            job.results = job
                .document_refs
                .iter()
                .enumerate()
                .map(|(i, doc_ref)| DocumentOutcome::skipped(i, doc_ref))
                .collect();
        } else {
            // Pre-allocated slots exist (the job was queued after a start
            // attempt): keep anything recorded, skip the rest.
            for slot in &mut job.results {
                if slot.status == DocumentStatus::Pending {
                    *slot = DocumentOutcome::skipped(slot.index, slot.document_ref.clone());
                }
            }
        }
        let progress = job.progress;
        self.store.update(job).await?;
        self.publisher.publish(JobEvent::JobFinished {
            job_id: id,
            status: JobStatus::Cancelled,
            progress,
        });
        info!(job_id = %id, "job cancelled before dispatch");
        Ok(())
    }

    /// While below the global cap, launch queued jobs oldest-first.
    async fn dispatch_queued(self: &Arc<Self>) {
        let Some(cap) = self.config.max_active_jobs else {
            return;
        };
        loop {
            let mut running = self.running.lock().await;
            if running.len() >= cap {
                return;
            }
            let active = match self.store.list_active().await {
                Ok(jobs) => jobs,
                Err(err) => {
                    warn!("queued dispatch scan failed: {err}");
                    return;
                }
            };
            // list_active is ordered by creation time: FIFO dispatch.
            let next = active
                .into_iter()
                .find(|j| j.status == JobStatus::Queued && !running.contains_key(&j.id));
            let Some(job) = next else {
                return;
            };
            let id = job.id;
            if let Err(err) = Arc::clone(self).spawn_run(job, &mut running).await {
                error!(job_id = %id, "failed to dispatch queued job: {err}");
                drop(running);
                self.fail_job_record(id, format!("failed to dispatch queued job: {err}"))
                    .await;
            }
        }
    }
}
