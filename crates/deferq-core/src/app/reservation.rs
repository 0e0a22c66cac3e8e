//! Reservation: pick the next job for a worker.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, instrument};

use super::lock::LockManager;
use crate::domain::{JobRecord, StoreError, WorkerName};
use crate::ports::{AvailabilityQuery, JobStore};

/// Fetches `read_ahead` candidates and tries to lease them in order.
///
/// Losing the race for the top candidate falls through to the next one
/// instead of retrying the same row. Candidates that were not won are left
/// untouched.
#[derive(Clone)]
pub struct Reservation {
    store: Arc<dyn JobStore>,
    locks: LockManager,
    queues: Vec<String>,
}

impl Reservation {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            locks: LockManager::new(Arc::clone(&store)),
            store,
            queues: Vec::new(),
        }
    }

    /// Only reserve jobs from these queues. Empty means all queues.
    pub fn with_queues(mut self, queues: Vec<String>) -> Self {
        self.queues = queues;
        self
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    #[instrument(skip_all, err, fields(worker = %worker, read_ahead = read_ahead))]
    pub async fn reserve(
        &self,
        worker: &WorkerName,
        read_ahead: usize,
        max_run_time: Duration,
    ) -> Result<Option<JobRecord>, StoreError> {
        let query = AvailabilityQuery {
            now: self.store.now(),
            limit: read_ahead,
            max_run_time,
            queues: self.queues.clone(),
        };
        let candidates = self.store.find_available(&query).await?;
        debug!(candidates = candidates.len(), "fetched reservation candidates");

        for mut job in candidates {
            if self.locks.try_acquire(&mut job, worker, max_run_time).await? {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }
}
