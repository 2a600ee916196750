//! `%azure.target` and `%azure.target-capability`.

use console::style;
use tokio_util::sync::CancellationToken;

use qazure_client::{AzureResult, MagicArguments};

use super::Session;

/// Set the active target, or show it when no id is given.
pub async fn execute(session: &mut Session, args: &MagicArguments, cancel: &CancellationToken) -> AzureResult<()> {
    let status = match args.first() {
        Some(id) => session.client.set_active_target(id, Some(cancel)).await?,
        None => session.client.active_target()?,
    };
    println!(
        "{} Active target: {} ({})",
        style("→").cyan().bold(),
        style(&status.id).cyan().bold(),
        status.current_availability
    );
    Ok(())
}

/// Override the capability programs are compiled against, or show it.
pub fn execute_capability(session: &mut Session, args: &MagicArguments) -> AzureResult<()> {
    let capability = match args.first() {
        Some(name) => session.client.set_target_capability(name)?,
        None => session.client.target_capability()?,
    };
    println!(
        "{} Target capability: {}",
        style("→").cyan().bold(),
        style(capability).cyan().bold()
    );
    Ok(())
}
