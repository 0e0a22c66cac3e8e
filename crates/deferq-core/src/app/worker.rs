//! Worker: reserve, run, and settle jobs.
//!
//! Workers are independent pollers. They share nothing but the store, and
//! every lease change goes through `LockManager`. Every other write to a job
//! is conditional on the lease the worker took, so a worker that overran its
//! lease and lost the job to another worker writes nothing.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::config::QueueConfig;
use super::reservation::Reservation;
use super::retry::RetryPolicy;
use crate::domain::{Decision, JobRecord, QueueError, StoreError, WorkerName};
use crate::ports::JobStore;
use crate::typed::HookDispatcher;

/// What happened to a job handed to `Worker::run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Performed and removed from the store.
    Succeeded,
    /// Failed; unlocked and scheduled for another attempt.
    Rescheduled,
    /// Failed for good; kept with `failed_at` or deleted.
    Failed,
    /// The lease expired and was taken over before the job settled. The
    /// result was discarded and the row left to the new holder.
    LeaseLost,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkOffSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl WorkOffSummary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

pub struct Worker {
    name: WorkerName,
    store: Arc<dyn JobStore>,
    reservation: Reservation,
    hooks: HookDispatcher,
    retry: RetryPolicy,
    config: Arc<QueueConfig>,
}

impl Worker {
    pub fn new(
        name: WorkerName,
        store: Arc<dyn JobStore>,
        hooks: HookDispatcher,
        config: Arc<QueueConfig>,
    ) -> Self {
        let reservation = Reservation::new(Arc::clone(&store)).with_queues(config.queues.clone());
        Self {
            name,
            store,
            reservation,
            hooks,
            retry: RetryPolicy::from_config(&config),
            config,
        }
    }

    pub fn name(&self) -> &WorkerName {
        &self.name
    }

    /// Reserve and run up to `num` jobs, stopping early when none is left.
    pub async fn work_off(&self, num: usize) -> Result<WorkOffSummary, StoreError> {
        let mut summary = WorkOffSummary::default();
        for _ in 0..num {
            match self.reserve_and_run().await? {
                None => break,
                Some(RunOutcome::Succeeded) => summary.succeeded += 1,
                Some(RunOutcome::Rescheduled | RunOutcome::Failed) => summary.failed += 1,
                Some(RunOutcome::LeaseLost) => {}
            }
        }
        Ok(summary)
    }

    /// One reservation attempt. `None` when no job could be leased.
    pub async fn reserve_and_run(&self) -> Result<Option<RunOutcome>, StoreError> {
        let reserved = self
            .reservation
            .reserve(&self.name, self.config.read_ahead, self.config.max_run_time)
            .await?;
        match reserved {
            Some(job) => self.run(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Run a job this worker holds the lease on, then settle it.
    ///
    /// Payload failures are not errors here: they are recorded on the job and
    /// reported through the outcome. Only store failures are returned.
    #[instrument(skip_all, fields(worker = %self.name, job_id, job))]
    pub async fn run(&self, mut job: JobRecord) -> Result<RunOutcome, StoreError> {
        let id = job.id.ok_or(StoreError::NotPersisted)?;
        let span = tracing::Span::current();
        span.record("job_id", tracing::field::display(id));
        span.record("job", job.display_name(self.hooks.codec()).as_str());

        info!("running job");
        let started = Instant::now();
        match self.hooks.invoke_job(&job).await {
            Ok(()) => {
                if !self.reservation.locks().delete_held(&job).await? {
                    return Ok(RunOutcome::LeaseLost);
                }
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job completed"
                );
                Ok(RunOutcome::Succeeded)
            }
            Err(QueueError::Deserialization(e)) => {
                job.last_error = Some(e.to_string());
                self.fail_job(job, "payload could not be decoded").await
            }
            Err(e) => self.handle_failed_job(job, &e).await,
        }
    }

    async fn handle_failed_job(
        &self,
        mut job: JobRecord,
        error: &QueueError,
    ) -> Result<RunOutcome, StoreError> {
        job.attempts = job.attempts.saturating_add(1);
        job.last_error = Some(error.to_string());

        let payload = job.payload_object(self.hooks.codec()).ok();
        let decision = self.retry.decide(&job, payload.as_deref(), self.store.now());
        match decision {
            Decision::Retry { run_at, reason } => {
                job.run_at = run_at;
                if !self.settle(&mut job).await? {
                    return Ok(RunOutcome::LeaseLost);
                }
                warn!(attempts = job.attempts, %error, %reason, "job failed, rescheduled");
                Ok(RunOutcome::Rescheduled)
            }
            Decision::MarkFailed { reason } => self.fail_job(job, &reason).await,
        }
    }

    async fn fail_job(&self, mut job: JobRecord, reason: &str) -> Result<RunOutcome, StoreError> {
        RetryPolicy::mark_failed(&mut job, self.store.now());

        let settled = if self.config.destroy_failed_jobs {
            self.reservation.locks().delete_held(&job).await?
        } else {
            self.settle(&mut job).await?
        };
        if !settled {
            return Ok(RunOutcome::LeaseLost);
        }
        error!(
            attempts = job.attempts,
            last_error = job.last_error.as_deref().unwrap_or_default(),
            reason,
            destroyed = self.config.destroy_failed_jobs,
            "job permanently failed"
        );
        Ok(RunOutcome::Failed)
    }

    /// Write the job's fields, then give up its lease. `false` when the lease
    /// had already been taken over.
    async fn settle(&self, job: &mut JobRecord) -> Result<bool, StoreError> {
        let locks = self.reservation.locks();
        if !locks.update_held(job).await? {
            return Ok(false);
        }
        locks.release(job).await?;
        Ok(true)
    }

    /// Poll until shutdown is requested or the sender is dropped.
    ///
    /// A job that is already running is finished before the loop exits.
    /// Store errors are logged and the next poll tries again.
    #[instrument(skip_all, fields(worker = %self.name))]
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        info!("worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.reserve_and_run().await {
                Ok(Some(outcome)) => {
                    debug!(?outcome, "job settled");
                    continue;
                }
                Ok(None) => {}
                Err(e) => error!(error = %e, "poll cycle failed"),
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.config.sleep_delay) => {}
            }
        }
        info!("worker stopped");
    }
}

/// Worker group handle.
/// - dropping the group (and with it `shutdown_tx`) stops every worker
/// - `shutdown_and_join()` waits for in-flight jobs to finish
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    pub fn spawn(workers: Vec<Worker>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = workers
            .into_iter()
            .map(|worker| {
                let rx = shutdown_rx.clone();
                tokio::spawn(async move { worker.start(rx).await })
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new leases. Running jobs are not interrupted.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                error!(error = %e, "worker task panicked");
            }
        }
    }
}
