//! Domain model: ids, job records, leases, states, decisions and errors.

pub mod decision;
pub mod errors;
pub mod ids;
pub mod job;
pub mod lease;
pub mod state;
pub mod worker;

pub use self::decision::Decision;
pub use self::errors::{
    DeserializationError, EncodeError, PerformError, QueueError, StoreError,
};
pub use self::ids::{Id, IdMarker, JobId};
pub use self::job::JobRecord;
pub use self::lease::Lease;
pub use self::state::JobState;
pub use self::worker::WorkerName;
