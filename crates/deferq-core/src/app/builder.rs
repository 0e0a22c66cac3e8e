//! JobQueueBuilder: wiring and startup validation.

use std::sync::Arc;

use super::config::QueueConfig;
use super::enqueue::{EnqueueOptions, EnqueueService};
use super::status::QueueCounts;
use super::worker::{Worker, WorkerGroup};
use crate::domain::{JobRecord, QueueError, StoreError, WorkerName};
use crate::ports::JobStore;
use crate::typed::{HookDispatcher, PayloadCodec, PayloadRegistry, PayloadType, RegistryError};

/// Builds a `JobQueue` over a store.
///
/// # Example
/// ```ignore
/// let queue = JobQueueBuilder::new()
///     .config(QueueConfig::from_env()?)
///     .register::<SendWelcome>()?
///     .expect_payload_types(&["acme.mailer.send_welcome.v1"])
///     .build(store)?;
/// ```
///
/// # Fail-fast
/// `build()` checks that every expected type tag is registered and not
/// denied, so a worker never starts without the decoders its jobs need.
pub struct JobQueueBuilder {
    registry: PayloadRegistry,
    config: QueueConfig,
    expected_types: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing payload types: {0:?}. These types were expected but are not decodable.")]
    MissingPayloadTypes(Vec<String>),
}

impl JobQueueBuilder {
    pub fn new() -> Self {
        Self {
            registry: PayloadRegistry::new(),
            config: QueueConfig::default(),
            expected_types: None,
        }
    }

    pub fn register<P: PayloadType>(mut self) -> Result<Self, RegistryError> {
        self.registry.register::<P>()?;
        Ok(self)
    }

    /// Refuse to decode `tag` even if a type is registered for it.
    pub fn deny(mut self, tag: impl Into<String>) -> Self {
        self.registry.deny(tag);
        self
    }

    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    pub fn expect_payload_types(mut self, tags: &[&str]) -> Self {
        self.expected_types = Some(tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn build(self, store: Arc<dyn JobStore>) -> Result<JobQueue, BuildError> {
        if let Some(expected) = &self.expected_types {
            let missing: Vec<String> = expected
                .iter()
                .filter(|tag| !self.registry.is_decodable(tag))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingPayloadTypes(missing));
            }
        }

        let config = Arc::new(self.config);
        let hooks = HookDispatcher::new(Arc::new(PayloadCodec::new(self.registry)));
        let enqueue = EnqueueService::new(Arc::clone(&store), hooks.clone(), Arc::clone(&config));
        Ok(JobQueue {
            store,
            hooks,
            config,
            enqueue,
        })
    }
}

impl Default for JobQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry point for producers and workers sharing one store.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    hooks: HookDispatcher,
    config: Arc<QueueConfig>,
    enqueue: EnqueueService,
}

impl JobQueue {
    pub async fn enqueue<P: PayloadType>(
        &self,
        payload: P,
        options: EnqueueOptions,
    ) -> Result<JobRecord, QueueError> {
        self.enqueue.enqueue(payload, options).await
    }

    pub fn worker(&self, name: WorkerName) -> Worker {
        Worker::new(
            name,
            Arc::clone(&self.store),
            self.hooks.clone(),
            Arc::clone(&self.config),
        )
    }

    /// Spawn `n` workers named `<name> #0` .. `<name> #n-1`.
    pub fn worker_group(&self, name: &WorkerName, n: usize) -> WorkerGroup {
        WorkerGroup::spawn((0..n).map(|i| self.worker(name.numbered(i))).collect())
    }

    pub fn codec(&self) -> &PayloadCodec {
        self.hooks.codec()
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub async fn counts(&self) -> Result<QueueCounts, StoreError> {
        self.store.counts().await
    }
}
