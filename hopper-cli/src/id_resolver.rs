//! Job ID resolution
//!
//! Lets commands take either a full job id or an unambiguous prefix of one.

use anyhow::{Result, bail};
use hopper_core::domain::partition::Partition;
use hopper_store::JobStore;

/// Resolve `input` to the id of exactly one stored job
///
/// An exact match always wins; otherwise the prefix must match a single
/// job across all partitions.
pub fn resolve_job_id(store: &JobStore, input: &str) -> Result<String> {
    if store.find(input)?.is_some() {
        return Ok(input.to_string());
    }

    let mut matches = Vec::new();
    for partition in Partition::ALL {
        for record in store.list(partition)? {
            if record.id.starts_with(input) {
                matches.push(record.id);
            }
        }
    }

    match matches.len() {
        0 => bail!("No job found with id or prefix '{}'", input),
        1 => Ok(matches.remove(0)),
        n => bail!(
            "Prefix '{}' is ambiguous, it matches {} jobs: {}",
            input,
            n,
            matches.join(", ")
        ),
    }
}
