//! Port implementations.
//!
//! - **InMemoryJobStore**: reference `JobStore` for tests, demos and
//!   single-process use. Production stores (SQL, document DBs) live in their
//!   own crates and implement the same trait.

pub mod memory_store;

pub use self::memory_store::InMemoryJobStore;
