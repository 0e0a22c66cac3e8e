//! EnqueueService: turn a payload into a job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::config::QueueConfig;
use crate::domain::{JobRecord, QueueError};
use crate::ports::JobStore;
use crate::typed::{Hook, HookDispatcher, PayloadType};

/// Per-job overrides. Unset fields take the queue defaults.
///
/// ```ignore
/// queue.enqueue(report, EnqueueOptions::new().priority(-5).queue("reports")).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: Option<i32>,
    pub queue: Option<String>,
    pub run_at: Option<DateTime<Utc>>,
}

impl EnqueueOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }
}

#[derive(Clone)]
pub struct EnqueueService {
    store: Arc<dyn JobStore>,
    hooks: HookDispatcher,
    config: Arc<QueueConfig>,
}

impl EnqueueService {
    pub fn new(store: Arc<dyn JobStore>, hooks: HookDispatcher, config: Arc<QueueConfig>) -> Self {
        Self {
            store,
            hooks,
            config,
        }
    }

    /// Create a job for `payload`.
    ///
    /// With `delay_jobs` the `enqueue` hook runs and the record is persisted
    /// (one store write). Without it the payload runs inline through the
    /// worker execution path and nothing is persisted.
    ///
    /// Payload types this queue could never decode are rejected with
    /// `QueueError::InvalidPayload` before anything runs.
    #[instrument(skip_all, err, fields(payload = P::TYPE, job_id))]
    pub async fn enqueue<P: PayloadType>(
        &self,
        payload: P,
        options: EnqueueOptions,
    ) -> Result<JobRecord, QueueError> {
        let codec = self.hooks.codec();
        if !codec.registry().is_decodable(P::TYPE) {
            return Err(QueueError::InvalidPayload(P::TYPE.to_string()));
        }

        let handler = codec.encode(&payload)?;
        let priority = options.priority.unwrap_or(self.config.default_priority);
        let queue = options.queue.or_else(|| self.config.default_queue.clone());
        let run_at = options.run_at.unwrap_or_else(|| self.store.now());
        let job = JobRecord::with_payload(handler, Arc::new(payload), priority, queue, run_at);

        if !self.config.delay_jobs {
            self.hooks.invoke_job(&job).await?;
            return Ok(job);
        }

        self.hooks.hook(&job, Hook::Enqueue).await?;
        let job = self.store.create(job).await?;
        if let Some(id) = job.id {
            tracing::Span::current().record("job_id", tracing::field::display(id));
        }
        info!(
            priority = job.priority,
            queue = job.queue.as_deref().unwrap_or_default(),
            run_at = %job.run_at,
            "job enqueued"
        );
        Ok(job)
    }
}
