//! Lease: the exclusive claim a worker holds on a job.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::WorkerName;

/// `locked_at` and `locked_by` travel together, so a record can never hold a
/// half-written lease. An unleased job has `Option<Lease>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub locked_at: DateTime<Utc>,
    pub locked_by: WorkerName,
}

impl Lease {
    pub fn new(locked_at: DateTime<Utc>, locked_by: WorkerName) -> Self {
        Self {
            locked_at,
            locked_by,
        }
    }

    /// A lease taken at `T` with duration `D` is reclaimable from `T + D` on.
    pub fn is_expired(&self, now: DateTime<Utc>, max_run_time: Duration) -> bool {
        self.locked_at + max_run_time <= now
    }

    pub fn is_held_by(&self, worker: &WorkerName) -> bool {
        &self.locked_by == worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn lease_expires_exactly_at_deadline() {
        let lease = Lease::new(at(0), WorkerName::new("w1"));
        let d = Duration::seconds(60);

        assert!(!lease.is_expired(at(59), d));
        assert!(lease.is_expired(at(60), d));
        assert!(lease.is_expired(at(61), d));
    }

    #[test]
    fn lease_knows_its_holder() {
        let lease = Lease::new(at(0), WorkerName::new("w1"));
        assert!(lease.is_held_by(&WorkerName::new("w1")));
        assert!(!lease.is_held_by(&WorkerName::new("w2")));
    }
}
