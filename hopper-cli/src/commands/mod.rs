//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod queue;

use anyhow::Result;
use clap::Subcommand;
use hopper_core::domain::partition::Partition;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create the queue directory and its partition files
    Init,
    /// Add a job to the queue
    Enqueue {
        /// Payload as inline JSON or @path to a JSON file
        #[arg(long)]
        payload: String,

        /// Job id (a UUID is generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Reject payloads without an id and an apply_url
        #[arg(long)]
        validate: bool,
    },
    /// Claim the oldest queued job
    Dequeue,
    /// Mark a processing job as completed
    Complete {
        /// Job ID or unambiguous prefix
        id: String,

        /// Result details as a JSON object (inline or @file)
        #[arg(long)]
        details: Option<String>,
    },
    /// Mark a processing job as failed, optionally requeueing it
    Fail {
        /// Job ID or unambiguous prefix
        id: String,

        /// Why the attempt failed
        #[arg(long)]
        reason: String,

        /// Requeue the job while its retry budget lasts
        #[arg(long)]
        retry: bool,

        /// Retries granted before the job fails permanently
        #[arg(long, default_value_t = 2)]
        max_retries: u32,

        /// Result details as a JSON object (inline or @file)
        #[arg(long)]
        details: Option<String>,
    },
    /// Park a processing job for manual review
    Review {
        /// Job ID or unambiguous prefix
        id: String,

        /// Why the job needs a human
        #[arg(long)]
        reason: String,

        /// Result details as a JSON object (inline or @file)
        #[arg(long)]
        details: Option<String>,
    },
    /// List processing jobs older than a threshold
    Stale {
        /// Age in seconds after which a processing job is stale
        #[arg(long, default_value_t = 900)]
        threshold: u64,
    },
    /// Show per-partition job counts
    Stats,
    /// List the jobs of one partition
    List {
        /// queued, processing, completed, failed or review
        partition: Partition,
    },
    /// Show one job
    Show {
        /// Job ID or unambiguous prefix
        id: String,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Init => queue::init(config),
        Commands::Enqueue {
            payload,
            id,
            validate,
        } => job::enqueue(config, &payload, id, validate),
        Commands::Dequeue => job::dequeue(config),
        Commands::Complete { id, details } => job::complete(config, &id, details.as_deref()),
        Commands::Fail {
            id,
            reason,
            retry,
            max_retries,
            details,
        } => job::fail(config, &id, &reason, retry, max_retries, details.as_deref()),
        Commands::Review {
            id,
            reason,
            details,
        } => job::review(config, &id, &reason, details.as_deref()),
        Commands::Stale { threshold } => queue::stale(config, threshold),
        Commands::Stats => queue::stats(config),
        Commands::List { partition } => job::list(config, partition),
        Commands::Show { id } => job::show(config, &id),
    }
}
