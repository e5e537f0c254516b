//! Hopper Core
//!
//! Core types shared by every Hopper crate.
//!
//! This crate contains:
//! - Domain types: the job record, its status and the partitions it lives in
//! - DTOs: requests and reports exchanged between the store, worker and CLI

pub mod domain;
pub mod dto;
