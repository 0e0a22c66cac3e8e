//! JobStore port: the shared store every worker coordinates through.
//!
//! Workers never talk to each other. All cross-worker coordination is the
//! store's conditional lease write (`acquire_lease`), so an implementation
//! must make that call atomic (e.g. `UPDATE ... WHERE id = $1 AND locked_at
//! IS NOT DISTINCT FROM $2 AND locked_by IS NOT DISTINCT FROM $3 AND
//! run_at <= $now AND failed_at IS NULL`). A worker settling a job writes
//! through `update_if_held` / `delete_if_held`, which are conditional on the
//! lease it took, so a worker whose lease expired and was taken over cannot
//! touch the row any more.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::app::status::QueueCounts;
use crate::domain::{JobId, JobRecord, Lease, StoreError};

/// Reservation predicate and ordering.
///
/// A job matches when `run_at <= now`, it has not failed, it is unleased or
/// its lease has expired, and (if `queues` is non-empty) its queue is listed.
/// Stores return matches ordered by `priority` then `run_at`, ascending.
#[derive(Debug, Clone)]
pub struct AvailabilityQuery {
    pub now: DateTime<Utc>,
    pub limit: usize,
    pub max_run_time: Duration,
    pub queues: Vec<String>,
}

impl AvailabilityQuery {
    pub fn matches(&self, job: &JobRecord) -> bool {
        if job.is_failed() || job.run_at > self.now {
            return false;
        }
        if let Some(lease) = &job.lease {
            if !lease.is_expired(self.now, self.max_run_time) {
                return false;
            }
        }
        if self.queues.is_empty() {
            return true;
        }
        job.queue
            .as_ref()
            .is_some_and(|queue| self.queues.iter().any(|q| q == queue))
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// The store's notion of "now". Everything that compares against stored
    /// timestamps reads this clock.
    fn now(&self) -> DateTime<Utc>;

    /// Persist a new record, assigning its id.
    async fn create(&self, job: JobRecord) -> Result<JobRecord, StoreError>;

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Up to `query.limit` candidates matching the reservation predicate.
    async fn find_available(&self, query: &AvailabilityQuery)
    -> Result<Vec<JobRecord>, StoreError>;

    /// Compare-and-set on the lease fields.
    ///
    /// Writes `lease` only if the stored lease still equals `expected`, the
    /// job has not failed and `run_at <= lease.locked_at`. Returns whether
    /// this write won. A lost race is `Ok(false)`, never an error.
    async fn acquire_lease(
        &self,
        id: JobId,
        expected: Option<&Lease>,
        lease: &Lease,
    ) -> Result<bool, StoreError>;

    /// Clear the lease fields if they still equal `held`. Touches nothing else.
    async fn clear_lease(&self, id: JobId, held: &Lease) -> Result<bool, StoreError>;

    /// Overwrite the persisted fields of an existing record, except the
    /// lease. Lease fields only change through `acquire_lease` and
    /// `clear_lease`.
    async fn update(&self, job: &JobRecord) -> Result<(), StoreError>;

    /// `update`, but only while the stored lease still equals `held`.
    /// Returns whether the write happened.
    async fn update_if_held(&self, job: &JobRecord, held: &Lease) -> Result<bool, StoreError>;

    /// Remove a record unconditionally.
    async fn delete(&self, id: JobId) -> Result<(), StoreError>;

    /// Remove a record only while the stored lease still equals `held`
    /// (success path, or failed job with `destroy_failed_jobs`).
    async fn delete_if_held(&self, id: JobId, held: &Lease) -> Result<bool, StoreError>;

    async fn counts(&self) -> Result<QueueCounts, StoreError>;
}
