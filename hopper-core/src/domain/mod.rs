//! Core domain types
//!
//! These types describe a job application as it moves through the queue.
//! The store persists them, the worker consumes them and the CLI displays them.

pub mod job;
pub mod partition;
pub mod payload;
