use serde::{Deserialize, Serialize};
use std::fmt;

/// Name a worker writes into `locked_by` when it takes a lease.
///
/// Names only need to be unique among workers sharing a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerName(String);

impl WorkerName {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// `host:<hostname> pid:<pid>` for the current process.
    pub fn for_current_process() -> Self {
        let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        Self(format!("host:{host} pid:{}", std::process::id()))
    }

    /// Derive a distinct name for the `index`-th worker of a group.
    pub fn numbered(&self, index: usize) -> Self {
        Self(format!("{} #{index}", self.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
