//! Repository Module
//!
//! Data access layer for the store.
//! Each partition of the queue directory is one JSON file holding an
//! ordered array of job records.

pub mod partition;

pub use partition::PartitionStore;
