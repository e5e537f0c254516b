//! Service Module
//!
//! Business logic layer of the store.
//! Every operation takes the global lock, reads the partitions it needs,
//! applies one lifecycle transition and writes the touched partitions back
//! before releasing the lock.

pub mod lifecycle;
pub mod maintenance;
mod partition_set;

pub use lifecycle::JobStore;
pub use maintenance::RecoveryReport;
