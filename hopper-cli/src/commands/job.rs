//! Job command handlers
//!
//! Handles the lifecycle commands (enqueue, dequeue, complete, fail,
//! review) and job inspection.

use anyhow::{Context, Result};
use colored::*;
use hopper_core::domain::job::{JobRecord, JobStatus};
use hopper_core::domain::partition::Partition;
use hopper_core::domain::payload::JobPayload;
use hopper_core::dto::job::NewJob;

use crate::config::Config;
use crate::id_resolver::resolve_job_id;
use crate::types::{JsonInput, parse_details};

/// Add a job to the queue
pub fn enqueue(config: &Config, payload: &str, id: Option<String>, validate: bool) -> Result<()> {
    let payload = JsonInput::parse(payload).load()?;

    if validate {
        JobPayload::from_value(&payload).context("Payload failed validation")?;
    }

    let job = NewJob { id, payload };
    let job_id = job.resolve_id();
    let job = NewJob::with_id(job_id.clone(), job.payload);

    let store = config.open_store()?;
    if store.enqueue(job)? {
        println!("{} Enqueued job {}", "✓".green(), job_id.cyan());
    } else {
        println!(
            "{}",
            format!("Job {} already exists, nothing enqueued.", job_id).yellow()
        );
    }

    Ok(())
}

/// Claim the oldest queued job and print it
pub fn dequeue(config: &Config) -> Result<()> {
    let store = config.open_store()?;

    match store.dequeue()? {
        Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
        None => println!("{}", "No queued jobs.".yellow()),
    }

    Ok(())
}

/// Mark a processing job as completed
pub fn complete(config: &Config, id: &str, details: Option<&str>) -> Result<()> {
    let details = parse_details(details)?;
    let store = config.open_store()?;
    let id = resolve_job_id(&store, id)?;

    let moved = store.complete(&id, details)?;
    report_transition(&id, moved.then_some(JobStatus::Completed));
    Ok(())
}

/// Mark a processing job as failed
pub fn fail(
    config: &Config,
    id: &str,
    reason: &str,
    retry: bool,
    max_retries: u32,
    details: Option<&str>,
) -> Result<()> {
    let details = parse_details(details)?;
    let store = config.open_store()?;
    let id = resolve_job_id(&store, id)?;

    let status = store.fail_with_status(&id, reason, details, retry, max_retries)?;
    report_transition(&id, status);
    Ok(())
}

/// Park a processing job for manual review
pub fn review(config: &Config, id: &str, reason: &str, details: Option<&str>) -> Result<()> {
    let details = parse_details(details)?;
    let store = config.open_store()?;
    let id = resolve_job_id(&store, id)?;

    let moved = store.flag_for_review(&id, reason, details)?;
    report_transition(&id, moved.then_some(JobStatus::NeedsReview));
    Ok(())
}

/// List the jobs of one partition
pub fn list(config: &Config, partition: Partition) -> Result<()> {
    let store = config.open_store()?;
    let jobs = store.list(partition)?;

    if jobs.is_empty() {
        println!("{}", format!("No {} jobs.", partition).yellow());
    } else {
        println!(
            "{}",
            format!("Found {} {} job(s):", jobs.len(), partition).bold()
        );
        println!();
        for job in &jobs {
            print_job_summary(job);
        }
    }

    Ok(())
}

/// Show one job in full
pub fn show(config: &Config, id: &str) -> Result<()> {
    let store = config.open_store()?;
    let id = resolve_job_id(&store, id)?;

    match store.find(&id)? {
        Some(job) => print_job_details(&job),
        None => println!("{}", format!("Job {} not found.", id).yellow()),
    }

    Ok(())
}

fn report_transition(id: &str, status: Option<JobStatus>) {
    if let Some(status) = status {
        println!("{} Job {} is now {}", "✓".green(), id.cyan(), colorize_status(&status));
    } else {
        println!(
            "{}",
            format!("Job {} is not processing, nothing changed.", id).yellow()
        );
    }
}

/// Print a one-paragraph job summary
fn print_job_summary(job: &JobRecord) {
    println!("  {} Job {}", "▸".cyan(), job.id.dimmed());
    println!("    Status:   {}", colorize_status(&job.status));
    println!("    Attempts: {}", job.attempts);
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let Ok(payload) = JobPayload::from_value(&job.payload) {
        println!("    Apply:    {}", payload.apply_url.dimmed());
    }
    if let Some(error) = &job.last_error {
        println!("    Error:    {}", error.red());
    }
    println!();
}

/// Print detailed job information
fn print_job_details(job: &JobRecord) {
    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.cyan());
    println!("  Status:      {}", colorize_status(&job.status));
    println!("  Attempts:    {}", job.attempts);
    println!(
        "  Created:     {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = job.started_at {
        println!("  Started:     {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(ended) = job.ended_at {
        println!("  Ended:       {}", ended.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = job.started_at {
            let seconds = ended.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }

    if let Some(error) = &job.last_error {
        println!("\n{}", "Last Error:".bold());
        println!("{}", error.red());
    }

    println!("\n{}", "Payload:".bold());
    match serde_json::to_string_pretty(&job.payload) {
        Ok(pretty) => println!("{}", pretty),
        Err(_) => println!("{:?}", job.payload),
    }

    if let Some(result) = &job.result {
        println!("\n{}", "Result:".bold());
        for (key, value) in result {
            println!("  {} = {}", key.cyan(), value);
        }
    }
}

/// Colorize job status for display
fn colorize_status(status: &JobStatus) -> colored::ColoredString {
    let status_str = status.to_string();
    match status {
        JobStatus::Queued => status_str.yellow(),
        JobStatus::Processing => status_str.cyan(),
        JobStatus::Completed => status_str.green(),
        JobStatus::Failed => status_str.red(),
        JobStatus::NeedsReview => status_str.magenta(),
    }
}
