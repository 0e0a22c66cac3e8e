//! Job record: one unit of deferred work as stored.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeserializationError, EncodeError, JobId, JobState, Lease};
use crate::typed::{Payload, PayloadCodec, PayloadType};

/// Persisted job row.
///
/// Design:
/// - `handler` is the source of truth for the payload. It only changes through
///   `set_payload_object`, which re-encodes.
/// - The decoded payload is cached per process and never persisted. A record
///   loaded from the store starts with an empty cache.
/// - Lease fields live in `Option<Lease>`, so they are set and cleared together.
#[derive(Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Assigned by the store on create; `None` for records that were never persisted.
    pub id: Option<JobId>,

    handler: String,

    /// Lower values are reserved first.
    pub priority: i32,

    /// Partition key for worker pools. `None` is the unnamed default queue.
    pub queue: Option<String>,

    /// Not eligible for reservation before this instant.
    pub run_at: DateTime<Utc>,

    pub lease: Option<Lease>,

    /// Number of failed attempts so far.
    pub attempts: u32,

    /// Last captured failure message. Advisory only.
    pub last_error: Option<String>,

    /// Terminal failure marker.
    pub failed_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    payload: OnceLock<Arc<dyn Payload>>,
}

impl JobRecord {
    /// Rebuild a record from a stored handler.
    pub fn from_handler(
        handler: impl Into<String>,
        priority: i32,
        queue: Option<String>,
        run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            handler: handler.into(),
            priority,
            queue,
            run_at,
            lease: None,
            attempts: 0,
            last_error: None,
            failed_at: None,
            payload: OnceLock::new(),
        }
    }

    /// Build a record whose payload cache is already warm.
    ///
    /// `handler` must be the encoding of `payload`; `EnqueueService` guarantees it.
    pub(crate) fn with_payload(
        handler: String,
        payload: Arc<dyn Payload>,
        priority: i32,
        queue: Option<String>,
        run_at: DateTime<Utc>,
    ) -> Self {
        let job = Self::from_handler(handler, priority, queue, run_at);
        let _ = job.payload.set(payload);
        job
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Decoded payload, materialized on first access and cached.
    pub fn payload_object(
        &self,
        codec: &PayloadCodec,
    ) -> Result<Arc<dyn Payload>, DeserializationError> {
        if let Some(payload) = self.payload.get() {
            return Ok(Arc::clone(payload));
        }
        let decoded = codec.decode(&self.handler)?;
        Ok(Arc::clone(self.payload.get_or_init(|| decoded)))
    }

    /// Replace the payload. This is the only way `handler` changes.
    pub fn set_payload_object<P: PayloadType>(
        &mut self,
        codec: &PayloadCodec,
        payload: P,
    ) -> Result<(), EncodeError> {
        self.handler = codec.encode(&payload)?;
        self.payload = OnceLock::new();
        let _ = self.payload.set(Arc::new(payload));
        Ok(())
    }

    /// Drop the cached payload, as after a reload from the store.
    pub fn reset_payload(&mut self) {
        self.payload = OnceLock::new();
    }

    pub fn has_cached_payload(&self) -> bool {
        self.payload.get().is_some()
    }

    /// Name used in logs. Never fails, see `PayloadCodec::display_name`.
    pub fn display_name(&self, codec: &PayloadCodec) -> String {
        codec.display_name(self)
    }

    pub fn is_failed(&self) -> bool {
        self.failed_at.is_some()
    }

    pub fn is_leased(&self) -> bool {
        self.lease.is_some()
    }

    /// Clear the lease in memory. Persisting is up to the caller.
    pub fn unlock(&mut self) {
        self.lease = None;
    }

    pub fn state(&self, now: DateTime<Utc>) -> JobState {
        if self.is_failed() {
            JobState::Failed
        } else if self.is_leased() {
            JobState::Leased
        } else if self.run_at > now {
            JobState::Scheduled
        } else {
            JobState::Ready
        }
    }
}

impl fmt::Debug for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRecord")
            .field("id", &self.id)
            .field("handler", &self.handler)
            .field("priority", &self.priority)
            .field("queue", &self.queue)
            .field("run_at", &self.run_at)
            .field("lease", &self.lease)
            .field("attempts", &self.attempts)
            .field("last_error", &self.last_error)
            .field("failed_at", &self.failed_at)
            .field("payload_cached", &self.has_cached_payload())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkerName;
    use crate::typed::testing::{Greeting, test_codec};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn payload_object_is_decoded_once_and_cached() {
        let codec = test_codec();
        let handler = codec.encode(&Greeting::new("ada")).unwrap();
        let job = JobRecord::from_handler(handler, 0, None, now());

        assert!(!job.has_cached_payload());
        let first = job.payload_object(&codec).unwrap();
        let second = job.payload_object(&codec).unwrap();

        assert!(job.has_cached_payload());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn reset_payload_forces_a_fresh_decode() {
        let codec = test_codec();
        let handler = codec.encode(&Greeting::new("ada")).unwrap();
        let mut job = JobRecord::from_handler(handler, 0, None, now());

        let first = job.payload_object(&codec).unwrap();
        job.reset_payload();
        let second = job.payload_object(&codec).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn set_payload_object_rewrites_handler() {
        let codec = test_codec();
        let handler = codec.encode(&Greeting::new("ada")).unwrap();
        let mut job = JobRecord::from_handler(handler.clone(), 0, None, now());

        job.set_payload_object(&codec, Greeting::new("grace")).unwrap();

        assert_ne!(job.handler(), handler);
        assert!(job.handler().contains("grace"));
        assert!(job.has_cached_payload());
    }

    #[test]
    fn undecodable_handler_surfaces_deserialization_error() {
        let codec = test_codec();
        let job = JobRecord::from_handler("!payload:nope.v1 {}", 0, None, now());

        let err = job.payload_object(&codec).err().unwrap();
        assert!(matches!(err, DeserializationError::UnknownType { .. }));
        assert!(!job.has_cached_payload());
    }

    #[test]
    fn state_is_derived_from_fields() {
        let mut job = JobRecord::from_handler("!payload:x {}", 0, None, now());
        assert_eq!(job.state(now()), JobState::Ready);

        job.run_at = now() + Duration::seconds(10);
        assert_eq!(job.state(now()), JobState::Scheduled);

        job.lease = Some(Lease::new(now(), WorkerName::new("w")));
        assert_eq!(job.state(now()), JobState::Leased);

        job.unlock();
        job.failed_at = Some(now());
        assert_eq!(job.state(now()), JobState::Failed);
        assert!(job.state(now()).is_terminal());
    }

    #[test]
    fn cached_payload_is_not_serialized() {
        let codec = test_codec();
        let handler = codec.encode(&Greeting::new("ada")).unwrap();
        let job = JobRecord::from_handler(handler, 3, Some("mail".to_string()), now());
        let _ = job.payload_object(&codec).unwrap();

        let json = serde_json::to_string(&job).unwrap();
        let back: JobRecord = serde_json::from_str(&json).unwrap();

        assert!(!back.has_cached_payload());
        assert_eq!(back.handler(), job.handler());
        assert_eq!(back.priority, 3);
        assert_eq!(back.queue.as_deref(), Some("mail"));
    }
}
