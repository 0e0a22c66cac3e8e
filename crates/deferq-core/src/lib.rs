//! deferq-core
//!
//! A persistent, priority-ordered background job queue. Producers enqueue
//! payloads; independent workers poll a shared store, lease jobs through a
//! compare-and-set on the lease fields, run them, and retry failures with
//! backoff until a terminal failure.
//!
//! # Modules
//! - **domain**: job record, lease, ids, decisions, errors
//! - **ports**: `JobStore`, `Clock`, `IdGenerator`
//! - **typed**: `Payload` traits, registry, codec, hook dispatch
//! - **app**: enqueue, reservation, retry policy, worker loop, builder
//! - **impls**: in-memory store

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;
