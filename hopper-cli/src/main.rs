//! Hopper CLI
//!
//! Command-line interface for inspecting and operating a job queue
//! directory.

mod commands;
mod config;
mod id_resolver;
mod types;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hopper")]
#[command(about = "Hopper job application queue CLI", long_about = None)]
struct Cli {
    /// Queue directory
    #[arg(long, env = "HOPPER_QUEUE_DIR", default_value = "queue_system")]
    queue_dir: PathBuf,

    /// How long to wait for the queue lock, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    lock_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hopper_store=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config {
        queue_dir: cli.queue_dir,
        lock_timeout: Duration::from_millis(cli.lock_timeout_ms),
    };

    handle_command(cli.command, &config)
}
