//! Hopper Worker
//!
//! Consumer side of the queue: claims jobs, hands them to a [`JobHandler`]
//! and reports the outcome back to the store.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Services: the job handler and the page cache it shares across jobs
//! - Scheduler: the polling loop and the stale job reaper
//!
//! [`JobHandler`]: service::JobHandler

pub mod config;
pub mod scheduler;
pub mod service;
