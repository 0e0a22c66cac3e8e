//! LockManager: the worker-side half of the lease protocol.
//!
//! The in-memory check here is only a filter. Exclusivity comes from the
//! store's compare-and-set, which re-checks eligibility against the row as
//! it is at write time. Settling writes are conditional on the same lease.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::domain::{JobRecord, Lease, StoreError, WorkerName};
use crate::ports::JobStore;

#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn JobStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Try to lease `job` for `worker`.
    ///
    /// Returns `Ok(true)` only if this call's conditional write won. On a win
    /// `job.lease` reflects the stored lease. A lost race, an ineligible job
    /// or a job that vanished all return `Ok(false)`.
    pub async fn try_acquire(
        &self,
        job: &mut JobRecord,
        worker: &WorkerName,
        max_run_time: Duration,
    ) -> Result<bool, StoreError> {
        let Some(id) = job.id else {
            return Err(StoreError::NotPersisted);
        };
        let now = self.store.now();

        if job.is_failed() || job.run_at > now {
            return Ok(false);
        }
        if let Some(current) = &job.lease {
            if !current.is_expired(now, max_run_time) {
                return Ok(false);
            }
        }

        let lease = Lease::new(now, worker.clone());
        let won = self
            .store
            .acquire_lease(id, job.lease.as_ref(), &lease)
            .await?;
        if won {
            debug!(job_id = %id, worker = %worker, "lease acquired");
            job.lease = Some(lease);
        }
        Ok(won)
    }

    /// Persist `job`'s fields, but only while its lease is still the stored one.
    ///
    /// `Ok(false)` when the lease was taken over after expiry; the new holder
    /// owns the row and nothing is written.
    pub async fn update_held(&self, job: &JobRecord) -> Result<bool, StoreError> {
        let Some(held) = &job.lease else {
            return Ok(false);
        };
        let written = self.store.update_if_held(job, held).await?;
        if !written {
            warn!(worker = %held.locked_by, "lease was lost before update");
        }
        Ok(written)
    }

    /// Delete `job`, but only while its lease is still the stored one.
    pub async fn delete_held(&self, job: &JobRecord) -> Result<bool, StoreError> {
        let id = job.id.ok_or(StoreError::NotPersisted)?;
        let Some(held) = &job.lease else {
            return Ok(false);
        };
        let deleted = self.store.delete_if_held(id, held).await?;
        if !deleted {
            warn!(job_id = %id, worker = %held.locked_by, "lease was lost before delete");
        }
        Ok(deleted)
    }

    /// Clear the lease this worker holds on `job`, in the store and in memory.
    ///
    /// If the lease was lost in the meantime (taken over after expiry) the
    /// stored row is left alone.
    pub async fn release(&self, job: &mut JobRecord) -> Result<(), StoreError> {
        let (Some(id), Some(lease)) = (job.id, job.lease.take()) else {
            return Ok(());
        };
        if !self.store.clear_lease(id, &lease).await? {
            warn!(job_id = %id, worker = %lease.locked_by, "lease was lost before release");
        }
        Ok(())
    }
}
