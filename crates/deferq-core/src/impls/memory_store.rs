//! In-memory job store.
//!
//! Every operation runs under one async mutex, which makes `acquire_lease`
//! trivially atomic. Stored rows never carry a decoded payload: records handed
//! out are fresh "loads" and start with an empty payload cache.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::app::status::QueueCounts;
use crate::domain::{JobId, JobRecord, JobState, Lease, StoreError};
use crate::ports::{AvailabilityQuery, Clock, IdGenerator, JobStore, UlidGenerator};

pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    clock: Arc<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl InMemoryJobStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let ids = Box::new(UlidGenerator::new(Arc::clone(&clock)));
        Self {
            jobs: Mutex::new(HashMap::new()),
            clock,
            ids,
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    /// Snapshot of every stored record, oldest first.
    pub async fn all(&self) -> Vec<JobRecord> {
        let jobs = self.jobs.lock().await;
        let mut all: Vec<JobRecord> = jobs.values().map(load).collect();
        all.sort_by_key(|job| job.id);
        all
    }
}

/// Copy a stored row out as a freshly loaded record.
fn load(stored: &JobRecord) -> JobRecord {
    let mut job = stored.clone();
    job.reset_payload();
    job
}

fn persisted_id(job: &JobRecord) -> Result<JobId, StoreError> {
    job.id.ok_or(StoreError::NotPersisted)
}

/// Write `job` over `stored`, keeping the stored lease.
fn overwrite(stored: &mut JobRecord, job: &JobRecord) {
    let lease = stored.lease.take();
    *stored = load(job);
    stored.lease = lease;
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[instrument(skip_all, err, fields(job_id))]
    async fn create(&self, mut job: JobRecord) -> Result<JobRecord, StoreError> {
        let id = self.ids.generate_job_id();
        job.id = Some(id);
        tracing::Span::current().record("job_id", tracing::field::display(id));

        self.jobs.lock().await.insert(id, load(&job));
        Ok(job)
    }

    async fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.jobs.lock().await.get(&id).map(load))
    }

    #[instrument(skip_all, err, fields(limit = query.limit))]
    async fn find_available(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let jobs = self.jobs.lock().await;
        let mut candidates: Vec<&JobRecord> = jobs.values().filter(|j| query.matches(j)).collect();
        candidates.sort_by_key(|job| (job.priority, job.run_at, job.id));

        Ok(candidates
            .into_iter()
            .take(query.limit)
            .map(load)
            .collect())
    }

    #[instrument(skip_all, err, fields(job_id = %id, worker = %lease.locked_by))]
    async fn acquire_lease(
        &self,
        id: JobId,
        expected: Option<&Lease>,
        lease: &Lease,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(&id) else {
            debug!("job vanished before lease write");
            return Ok(false);
        };

        if job.lease.as_ref() != expected || job.is_failed() || job.run_at > lease.locked_at {
            debug!("lease write lost");
            return Ok(false);
        }

        job.lease = Some(lease.clone());
        Ok(true)
    }

    #[instrument(skip_all, err, fields(job_id = %id))]
    async fn clear_lease(&self, id: JobId, held: &Lease) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(job) if job.lease.as_ref() == Some(held) => {
                job.unlock();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update(&self, job: &JobRecord) -> Result<(), StoreError> {
        let id = persisted_id(job)?;
        let mut jobs = self.jobs.lock().await;
        let stored = jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        overwrite(stored, job);
        Ok(())
    }

    #[instrument(skip_all, err, fields(job_id, worker = %held.locked_by))]
    async fn update_if_held(&self, job: &JobRecord, held: &Lease) -> Result<bool, StoreError> {
        let id = persisted_id(job)?;
        tracing::Span::current().record("job_id", tracing::field::display(id));
        let mut jobs = self.jobs.lock().await;
        match jobs.get_mut(&id) {
            Some(stored) if stored.lease.as_ref() == Some(held) => {
                overwrite(stored, job);
                Ok(true)
            }
            _ => {
                debug!("lease no longer held, update skipped");
                Ok(false)
            }
        }
    }

    async fn delete(&self, id: JobId) -> Result<(), StoreError> {
        self.jobs
            .lock()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    #[instrument(skip_all, err, fields(job_id = %id, worker = %held.locked_by))]
    async fn delete_if_held(&self, id: JobId, held: &Lease) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.get(&id).and_then(|job| job.lease.as_ref()) != Some(held) {
            debug!("lease no longer held, delete skipped");
            return Ok(false);
        }
        jobs.remove(&id);
        Ok(true)
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let now = self.now();
        let jobs = self.jobs.lock().await;
        let mut counts = QueueCounts::default();
        for job in jobs.values() {
            match job.state(now) {
                JobState::Ready => counts.ready += 1,
                JobState::Scheduled => counts.scheduled += 1,
                JobState::Leased => counts.leased += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkerName;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn store() -> (Arc<FixedClock>, InMemoryJobStore) {
        let clock = Arc::new(FixedClock::new(start()));
        let store = InMemoryJobStore::new(clock.clone());
        (clock, store)
    }

    fn job(priority: i32, run_at: DateTime<Utc>) -> JobRecord {
        JobRecord::from_handler("!payload:x {}", priority, None, run_at)
    }

    fn query(now: DateTime<Utc>, limit: usize) -> AvailabilityQuery {
        AvailabilityQuery {
            now,
            limit,
            max_run_time: Duration::hours(4),
            queues: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_counts_ready() {
        let (_, store) = store();
        let created = store.create(job(0, start())).await.unwrap();

        assert!(created.id.is_some());
        assert_eq!(store.len().await, 1);
        let counts = store.counts().await.unwrap();
        assert_eq!(counts.ready, 1);
        assert_eq!(counts.total(), 1);
    }

    #[tokio::test]
    async fn find_available_orders_by_priority_then_run_at() {
        let (_, store) = store();
        let late = store.create(job(0, start())).await.unwrap();
        let early = store
            .create(job(0, start() - Duration::minutes(5)))
            .await
            .unwrap();
        let urgent = store.create(job(-10, start())).await.unwrap();

        let found = store.find_available(&query(start(), 10)).await.unwrap();
        let ids: Vec<_> = found.iter().map(|j| j.id).collect();

        assert_eq!(ids, vec![urgent.id, early.id, late.id]);
    }

    #[tokio::test]
    async fn find_available_respects_limit_and_run_at() {
        let (_, store) = store();
        for _ in 0..3 {
            store.create(job(0, start())).await.unwrap();
        }
        store
            .create(job(0, start() + Duration::minutes(1)))
            .await
            .unwrap();

        assert_eq!(store.find_available(&query(start(), 2)).await.unwrap().len(), 2);
        assert_eq!(store.find_available(&query(start(), 10)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn acquire_lease_is_compare_and_set() {
        let (_, store) = store();
        let id = store.create(job(0, start())).await.unwrap().id.unwrap();

        let first = Lease::new(start(), WorkerName::new("w1"));
        let second = Lease::new(start(), WorkerName::new("w2"));

        assert!(store.acquire_lease(id, None, &first).await.unwrap());
        // w2 read the row before w1 wrote; its expectation is stale
        assert!(!store.acquire_lease(id, None, &second).await.unwrap());

        let stored = store.find(id).await.unwrap().unwrap();
        assert_eq!(stored.lease, Some(first));
    }

    #[tokio::test]
    async fn acquire_lease_refuses_failed_and_future_jobs() {
        let (_, store) = store();
        let mut failed = store.create(job(0, start())).await.unwrap();
        failed.failed_at = Some(start());
        store.update(&failed).await.unwrap();
        let future = store
            .create(job(0, start() + Duration::minutes(1)))
            .await
            .unwrap();

        let lease = Lease::new(start(), WorkerName::new("w1"));
        assert!(!store.acquire_lease(failed.id.unwrap(), None, &lease).await.unwrap());
        assert!(!store.acquire_lease(future.id.unwrap(), None, &lease).await.unwrap());
    }

    #[tokio::test]
    async fn clear_lease_only_clears_matching_lease() {
        let (_, store) = store();
        let id = store.create(job(0, start())).await.unwrap().id.unwrap();
        let lease = Lease::new(start(), WorkerName::new("w1"));
        let other = Lease::new(start(), WorkerName::new("w2"));
        store.acquire_lease(id, None, &lease).await.unwrap();

        assert!(!store.clear_lease(id, &other).await.unwrap());
        assert!(store.clear_lease(id, &lease).await.unwrap());
        assert!(store.find(id).await.unwrap().unwrap().lease.is_none());
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_rows() {
        let (_, store) = store();
        let unsaved = job(0, start());
        assert!(matches!(store.update(&unsaved).await, Err(StoreError::NotPersisted)));

        let created = store.create(job(0, start())).await.unwrap();
        let id = created.id.unwrap();
        store.delete(id).await.unwrap();
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.update(&created).await, Err(StoreError::NotFound(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_never_touches_the_lease() {
        let (_, store) = store();
        let id = store.create(job(0, start())).await.unwrap().id.unwrap();
        let lease = Lease::new(start(), WorkerName::new("w1"));
        store.acquire_lease(id, None, &lease).await.unwrap();

        let mut stale = store.find(id).await.unwrap().unwrap();
        stale.lease = None;
        stale.attempts = 4;
        store.update(&stale).await.unwrap();

        let stored = store.find(id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 4);
        assert_eq!(stored.lease, Some(lease));
    }

    #[tokio::test]
    async fn conditional_writes_need_the_current_lease() {
        let (_, store) = store();
        let id = store.create(job(0, start())).await.unwrap().id.unwrap();
        let mine = Lease::new(start(), WorkerName::new("w1"));
        let old = Lease::new(start() - Duration::hours(5), WorkerName::new("w0"));
        store.acquire_lease(id, None, &mine).await.unwrap();

        let mut changed = store.find(id).await.unwrap().unwrap();
        changed.attempts = 1;
        assert!(!store.update_if_held(&changed, &old).await.unwrap());
        assert!(!store.delete_if_held(id, &old).await.unwrap());
        assert_eq!(store.find(id).await.unwrap().unwrap().attempts, 0);

        assert!(store.update_if_held(&changed, &mine).await.unwrap());
        assert_eq!(store.find(id).await.unwrap().unwrap().attempts, 1);
        assert!(store.delete_if_held(id, &mine).await.unwrap());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn counts_follow_the_clock() {
        let (clock, store) = store();
        store
            .create(job(0, start() + Duration::seconds(30)))
            .await
            .unwrap();

        assert_eq!(store.counts().await.unwrap().scheduled, 1);
        clock.advance(Duration::seconds(30));
        assert_eq!(store.counts().await.unwrap().ready, 1);
    }
}
