//! App: ports and typed payloads wired into queue behavior.
//!
//! # Components
//! - **JobQueueBuilder / JobQueue**: wiring and startup validation
//! - **EnqueueService**: payload -> persisted job (or inline run)
//! - **Reservation / LockManager**: read-ahead reservation over the lease CAS
//! - **RetryPolicy**: attempt ceilings and backoff
//! - **Worker / WorkerGroup**: the poll loop

pub mod builder;
pub mod config;
pub mod enqueue;
pub mod lock;
pub mod reservation;
pub mod retry;
pub mod status;
pub mod worker;

pub use self::builder::{BuildError, JobQueue, JobQueueBuilder};
pub use self::config::{ConfigError, QueueConfig};
pub use self::enqueue::{EnqueueOptions, EnqueueService};
pub use self::lock::LockManager;
pub use self::reservation::Reservation;
pub use self::retry::RetryPolicy;
pub use self::status::QueueCounts;
pub use self::worker::{RunOutcome, WorkOffSummary, Worker, WorkerGroup};
