//! Job state, derived from the persisted fields of a `JobRecord`.

use serde::{Deserialize, Serialize};

/// Observable state of a job.
///
/// State transitions:
/// - Ready -> Leased -> (deleted on success)
/// - Ready -> Leased -> Scheduled -> Ready (retry after backoff)
/// - Ready -> Leased -> Failed (attempts exhausted or payload undecodable)
///
/// Nothing is stored for the state itself: it is computed from `run_at`,
/// the lease and `failed_at`, so it can never disagree with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Eligible for reservation now.
    Ready,

    /// Waiting for `run_at` (new future job, or retry backoff).
    Scheduled,

    /// Held by a worker.
    Leased,

    /// Terminal: excluded from reservation forever.
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Failed)
    }
}
