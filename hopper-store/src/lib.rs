//! Hopper Store
//!
//! Durable, crash-safe lifecycle store for job applications.
//!
//! Architecture:
//! - Repository: reads and atomically replaces one partition file at a time
//! - Lock: a single global file lock serializing every read-modify-write
//! - Service: the lifecycle operations (enqueue, dequeue, complete, fail,
//!   flag for review) plus maintenance (stale scan, stats, crash repair)
//!
//! Any number of threads or processes on one host may share a queue
//! directory. Every operation either completes fully under the lock or fails
//! fast with [`StoreError::LockTimeout`].

pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod repository;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use lock::{LockCoordinator, LockGuard};
pub use repository::PartitionStore;
pub use service::JobStore;
