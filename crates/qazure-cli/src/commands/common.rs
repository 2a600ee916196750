//! Shared output helpers for session commands.

use console::style;

use qazure_hal::{AzureJob, JobOutput, JobStatus, Quota, TargetStatus};

use super::COMMANDS;

/// Print the command list.
pub fn print_commands() {
    println!("{} Available commands:\n", style("→").cyan().bold());
    for (name, description) in COMMANDS {
        println!("  {:<24}  {}", style(name).green(), description);
    }
}

/// Print a target table.
pub fn print_targets(targets: &[TargetStatus]) {
    if targets.is_empty() {
        println!("No execution targets are available in this workspace.");
        return;
    }
    println!(
        "  {:<28}  {:<14}  {}",
        style("TARGET ID").bold(),
        style("AVAILABILITY").bold(),
        style("AVG QUEUE TIME (s)").bold()
    );
    println!("  {}", "-".repeat(64));
    for target in targets {
        let availability = match target.current_availability.as_str() {
            "Available" => style(target.current_availability.as_str()).green(),
            "Unavailable" => style(target.current_availability.as_str()).red(),
            other => style(other).yellow(),
        };
        println!(
            "  {:<28}  {:<14}  {}",
            style(&target.id).cyan(),
            availability,
            target.average_queue_time
        );
    }
}

fn styled_status(job: &AzureJob) -> console::StyledObject<String> {
    let status = job.status.clone();
    match job.state() {
        JobStatus::Succeeded => style(status).green(),
        JobStatus::Failed | JobStatus::Cancelled => style(status).red(),
        JobStatus::Waiting => style(status).yellow(),
        _ => style(status).cyan(),
    }
}

/// Print one job.
pub fn print_job(job: &AzureJob) {
    println!("  Job ID:   {}", style(&job.id).dim());
    println!("  Name:     {}", job.name);
    println!("  Target:   {}", job.target);
    println!("  Status:   {}", styled_status(job).bold());
    if let Some(created) = job.creation_time {
        println!("  Created:  {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(ended) = job.end_execution_time {
        println!("  Finished: {}", ended.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(ref error) = job.error_data {
        println!("  Error:    {} {}", style(&error.code).red(), error.message);
    }
}

/// Print a job table.
pub fn print_jobs(jobs: &[AzureJob]) {
    println!("{} {} job(s):\n", style("→").cyan().bold(), jobs.len());
    println!(
        "  {:<36}  {:<20}  {:<12}  {:<18}  {}",
        style("JOB ID").bold(),
        style("NAME").bold(),
        style("STATUS").bold(),
        style("TARGET").bold(),
        style("CREATED").bold()
    );
    println!("  {}", "-".repeat(108));
    for job in jobs {
        let created = job
            .creation_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "  {:<36}  {:<20}  {:<12}  {:<18}  {}",
            style(&job.id).dim(),
            job.name,
            styled_status(job),
            job.target,
            created
        );
    }
}

/// Print job output: histogram bars, or the raw document when the output
/// has no histogram.
pub fn print_output(output: &JobOutput) {
    println!(
        "\n{} Results of job {}:",
        style("✓").green().bold(),
        style(&output.job_id).dim()
    );
    let Some(ref histogram) = output.histogram else {
        let rendered = serde_json::to_string_pretty(&output.raw).unwrap_or_else(|_| output.raw.to_string());
        for line in rendered.lines() {
            println!("  {line}");
        }
        return;
    };
    if histogram.is_empty() {
        println!("  (no outcomes)");
        return;
    }

    let sorted = histogram.sorted();
    for (outcome, probability) in sorted.iter().take(16) {
        let percent = **probability * 100.0;
        let bar = "█".repeat((percent / 2.0).round() as usize);
        println!(
            "  {}: {:>7.4} ({:>5.2}%) {}",
            style(outcome).cyan(),
            probability,
            percent,
            style(bar).green()
        );
    }
    if sorted.len() > 16 {
        println!("  ... and {} more outcomes", sorted.len() - 16);
    }
}

/// Print a quota table.
pub fn print_quotas(quotas: &[Quota]) {
    if quotas.is_empty() {
        println!("No quotas are defined for this workspace.");
        return;
    }
    println!(
        "  {:<14}  {:<10}  {:<14}  {:>12}  {:>10}  {:>10}  {}",
        style("PROVIDER").bold(),
        style("DIMENSION").bold(),
        style("SCOPE").bold(),
        style("UTILIZATION").bold(),
        style("HOLDS").bold(),
        style("LIMIT").bold(),
        style("PERIOD").bold()
    );
    println!("  {}", "-".repeat(92));
    for quota in quotas {
        println!(
            "  {:<14}  {:<10}  {:<14}  {:>12}  {:>10}  {:>10}  {}",
            style(&quota.provider_id).cyan(),
            quota.dimension,
            quota.scope,
            quota.utilization,
            quota.holds,
            quota.limit,
            quota.period
        );
    }
}
