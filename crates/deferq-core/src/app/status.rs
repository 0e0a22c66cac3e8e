//! Status view: job counts by state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub ready: usize,
    pub scheduled: usize,
    pub leased: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub fn total(&self) -> usize {
        self.ready + self.scheduled + self.leased + self.failed
    }

    /// Jobs that may still run: everything except terminal failures.
    pub fn pending(&self) -> usize {
        self.ready + self.scheduled + self.leased
    }
}
