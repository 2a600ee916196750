//! `%azure.submit` and `%azure.execute`.

use tokio_util::sync::CancellationToken;

use qazure_client::{AzureResult, MagicArguments, SubmissionContext};

use super::Session;
use super::common::{print_output, print_job};

fn context(session: &Session, args: &MagicArguments) -> AzureResult<SubmissionContext> {
    match SubmissionContext::from_arguments(args, session.config.submission_defaults()) {
        Ok(context) => Ok(context),
        Err(e) => session.reject(e),
    }
}

/// Submit a job and print it.
pub async fn execute_submit(
    session: &mut Session,
    args: &MagicArguments,
    cancel: &CancellationToken,
) -> AzureResult<()> {
    let context = context(session, args)?;
    let job = session.client.submit_job(&context, Some(cancel)).await?;
    print_job(&job);
    Ok(())
}

/// Submit a job, wait for it and print its output.
pub async fn execute_run(
    session: &mut Session,
    args: &MagicArguments,
    cancel: &CancellationToken,
) -> AzureResult<()> {
    let context = context(session, args)?;
    let output = session.client.execute_job(&context, Some(cancel)).await?;
    print_output(&output);
    Ok(())
}
