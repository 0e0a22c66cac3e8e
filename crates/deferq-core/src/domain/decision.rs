//! Decision model: what happens to a job after a failed attempt.

use chrono::{DateTime, Utc};

/// The next action to take for a job whose attempt failed.
///
/// Produced by `RetryPolicy::decide`, which is pure. Applying the decision
/// (unlocking, persisting) is the worker's job.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Unlock the job and make it eligible again at `run_at`.
    Retry { run_at: DateTime<Utc>, reason: String },

    /// Set `failed_at`; the job is never reserved again.
    MarkFailed { reason: String },
}

impl Decision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Decision::MarkFailed { .. })
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::Retry { reason, .. } | Decision::MarkFailed { reason } => reason,
        }
    }
}
