//! Queue command handlers
//!
//! Handles whole-queue commands: initialization and repair, stale job
//! detection and partition counts.

use anyhow::Result;
use colored::*;
use hopper_core::domain::partition::Partition;
use hopper_core::dto::stats::UNKNOWN_COUNT;

use crate::config::Config;

/// Create the queue layout and repair crash leftovers
pub fn init(config: &Config) -> Result<()> {
    let store = config.open_store_unrepaired()?;
    let report = store.recover()?;

    println!(
        "{} Queue ready at {}",
        "✓".green(),
        config.queue_dir.display().to_string().cyan()
    );
    if !report.is_clean() {
        println!("{}", format!("Repaired: {}", report).yellow());
    }

    Ok(())
}

/// List processing jobs claimed more than `threshold` seconds ago
pub fn stale(config: &Config, threshold: u64) -> Result<()> {
    let store = config.open_store_unrepaired()?;
    let ids = store.stale_scan(threshold)?;

    if ids.is_empty() {
        println!(
            "{}",
            format!("No jobs processing for more than {}s.", threshold).yellow()
        );
    } else {
        println!(
            "{}",
            format!("Found {} stale job(s):", ids.len()).bold()
        );
        for id in ids {
            println!("  {} {}", "▸".cyan(), id);
        }
    }

    Ok(())
}

/// Print per-partition counts
pub fn stats(config: &Config) -> Result<()> {
    let store = config.open_store_unrepaired()?;
    let stats = store.stats();

    println!("{}", "Queue Stats:".bold());
    for partition in Partition::ALL {
        let count = stats.get(partition);
        let shown = if count == UNKNOWN_COUNT {
            "unknown".red()
        } else {
            count.to_string().normal()
        };
        println!("  {:<11} {}", format!("{}:", partition), shown);
    }

    if stats.has_unknown() {
        println!(
            "\n{}",
            "Some partitions could not be counted (lock busy or file corrupted).".yellow()
        );
    } else {
        println!("  {:<11} {}", "total:", stats.known_total());
    }

    Ok(())
}
