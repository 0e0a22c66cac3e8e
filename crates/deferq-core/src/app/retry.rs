//! Retry policy: attempt ceilings, backoff and terminal failure.

use chrono::{DateTime, Duration, Utc};

use super::config::{DEFAULT_MAX_ATTEMPTS, QueueConfig};
use crate::domain::{Decision, JobRecord};
use crate::typed::Payload;

/// Decides what happens after a failed attempt.
///
/// Payloads may override both the ceiling (`Payload::max_attempts`) and the
/// schedule (`Payload::reschedule_at`). When the payload cannot be decoded
/// the queue-wide defaults apply.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    default_max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(default_max_attempts: u32) -> Self {
        Self {
            default_max_attempts,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.max_attempts)
    }

    pub fn max_attempts(&self, payload: Option<&dyn Payload>) -> u32 {
        payload
            .and_then(|p| p.max_attempts())
            .unwrap_or(self.default_max_attempts)
    }

    /// When a job that has failed `attempts` times runs next.
    pub fn next_run_at(
        &self,
        payload: Option<&dyn Payload>,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        payload
            .and_then(|p| p.reschedule_at(now, attempts))
            .unwrap_or_else(|| {
                now.checked_add_signed(Self::default_backoff(attempts))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            })
    }

    /// `attempts^4 + 5` seconds: 6s, 21s, 86s, 261s, ...
    pub fn default_backoff(attempts: u32) -> Duration {
        let attempts = i64::from(attempts);
        let secs = attempts
            .checked_pow(4)
            .and_then(|p| p.checked_add(5))
            .unwrap_or(i64::MAX);
        Duration::try_seconds(secs).unwrap_or(Duration::MAX)
    }

    /// Terminal failure. The record stays for inspection but is never
    /// reserved again.
    pub fn mark_failed(job: &mut JobRecord, now: DateTime<Utc>) {
        job.failed_at = Some(now);
    }

    /// Decide for a job whose `attempts` already counts the failure at hand.
    pub fn decide(
        &self,
        job: &JobRecord,
        payload: Option<&dyn Payload>,
        now: DateTime<Utc>,
    ) -> Decision {
        let max_attempts = self.max_attempts(payload);
        if job.attempts >= max_attempts {
            Decision::MarkFailed {
                reason: format!("max attempts reached: {}/{}", job.attempts, max_attempts),
            }
        } else {
            let run_at = self.next_run_at(payload, job.attempts, now);
            Decision::Retry {
                run_at,
                reason: format!(
                    "retry {}/{} at {}",
                    job.attempts + 1,
                    max_attempts,
                    run_at.to_rfc3339()
                ),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
