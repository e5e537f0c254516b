//! Data Transfer Objects
//!
//! Requests and reports exchanged between the store and its callers
//! (producer, worker, CLI).

pub mod job;
pub mod stats;
