//! Ports: the seams to the outside world.
//!
//! The storage engine is an external collaborator. The core only depends on
//! `JobStore`; `impls::InMemoryJobStore` is the reference implementation.

pub mod clock;
pub mod id_generator;
pub mod job_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::{AvailabilityQuery, JobStore};
