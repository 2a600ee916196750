//! `%azure.connect`.

use tokio_util::sync::CancellationToken;

use qazure_client::{AzureResult, ConnectionParams, MagicArguments};

use super::Session;
use super::common::print_targets;

/// Connect to a workspace, or list the targets of the current connection.
///
/// Without arguments the configured workspace is used when the session is
/// not connected yet.
pub async fn execute(session: &mut Session, args: &MagicArguments, cancel: &CancellationToken) -> AzureResult<()> {
    if args.is_empty() && (session.client.is_connected() || !session.config.has_workspace()) {
        let targets = session.client.connection_status()?;
        print_targets(&targets);
        return Ok(());
    }

    let mut params = match ConnectionParams::from_arguments(args) {
        Ok(params) => params,
        Err(e) => return session.reject(e),
    };
    session
        .config
        .apply_workspace(&mut params, args.get("credential").is_some());

    let targets = session.client.connect(params, Some(cancel)).await?;
    print_targets(&targets);
    Ok(())
}
