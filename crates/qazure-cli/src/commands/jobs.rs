//! `%azure.status`, `%azure.output`, `%azure.jobs` and `%azure.quotas`.

use tokio_util::sync::CancellationToken;

use qazure_client::{AzureClientError, AzureResult, MagicArguments};

use super::Session;
use super::common::{print_output, print_job, print_jobs, print_quotas};

/// Show the status of a job.
pub async fn execute_status(
    session: &mut Session,
    args: &MagicArguments,
    cancel: &CancellationToken,
) -> AzureResult<()> {
    let job = session.client.job_status(args.first(), Some(cancel)).await?;
    print_job(&job);
    Ok(())
}

/// Show the output of a completed job.
pub async fn execute_output(
    session: &mut Session,
    args: &MagicArguments,
    cancel: &CancellationToken,
) -> AzureResult<()> {
    let output = session.client.job_result(args.first(), Some(cancel)).await?;
    print_output(&output);
    Ok(())
}

/// List jobs. The first positional argument filters by id, name or target.
pub async fn execute_list(
    session: &mut Session,
    args: &MagicArguments,
    cancel: &CancellationToken,
) -> AzureResult<()> {
    let count = match args.get("count").map(str::parse::<usize>) {
        None => None,
        Some(Ok(count)) => Some(count),
        Some(Err(_)) => {
            return session.reject(AzureClientError::UnknownError(format!(
                "Invalid job count {}.",
                args.get("count").unwrap_or_default()
            )));
        }
    };
    let jobs = session.client.job_list(args.first(), count, Some(cancel)).await?;
    if !jobs.is_empty() {
        print_jobs(&jobs);
    }
    Ok(())
}

/// List workspace quotas.
pub async fn execute_quotas(session: &mut Session, cancel: &CancellationToken) -> AzureResult<()> {
    let quotas = session.client.quota_list(Some(cancel)).await?;
    print_quotas(&quotas);
    Ok(())
}
