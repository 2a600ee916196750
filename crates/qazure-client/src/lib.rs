//! Azure Quantum job-submission client
//!
//! [`AzureClient`] is the stateful orchestrator behind the `%azure.*`
//! commands: it connects to a workspace, selects a target, submits programs
//! produced by an [`EntryPointGenerator`], and queries jobs, results and
//! quotas.
//!
//! # Operations
//!
//! | Operation | Requires | Result |
//! |-----------|----------|--------|
//! | [`connect`](AzureClient::connect) | - | valid targets |
//! | [`connection_status`](AzureClient::connection_status) | connection | valid targets |
//! | [`set_active_target`](AzureClient::set_active_target) | connection | target status |
//! | [`submit_job`](AzureClient::submit_job) | connection, target | job |
//! | [`execute_job`](AzureClient::execute_job) | connection, target | job output |
//! | [`job_status`](AzureClient::job_status) | connection | job |
//! | [`job_result`](AzureClient::job_result) | connection | job output |
//! | [`job_list`](AzureClient::job_list) | connection | jobs, newest first |
//! | [`quota_list`](AzureClient::quota_list) | connection | quotas |
//!
//! Every failure is an [`AzureClientError`] with a stable numeric code, and
//! its message is also written to the client's [`OutputChannel`](qazure_hal::OutputChannel).
//!
//! # Example
//!
//! ```no_run
//! use qazure_client::{AzureClient, ConnectionParams, SubmissionContext};
//!
//! # async fn run() -> qazure_client::AzureResult<()> {
//! let mut client = AzureClient::builder().environment("mock").build()?;
//! client
//!     .connect(
//!         ConnectionParams::new("sub", "rg", "WorkspaceNameWithMockProviders")
//!             .with_location("westus"),
//!         None,
//!     )
//!     .await?;
//! client.set_active_target("ionq.mock", None).await?;
//! let job = client
//!     .submit_job(&SubmissionContext::for_operation("HelloQ"), None)
//!     .await?;
//! println!("{}", job.id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod connection;
pub mod entry_point;
pub mod error;
pub mod events;
pub mod magic;
pub mod packages;
pub mod poll;
pub mod submission;

pub use client::{AzureClient, AzureClientBuilder, EnvLookup, valid_targets};
pub use connection::{ConnectionParams, WorkspaceCoordinates, parse_resource_id};
pub use entry_point::{
    CatalogError, EntryPoint, EntryPointError, EntryPointGenerator, EntryPointParameter,
    ProgramCatalog, ProgramDefinition, ProgramSource,
};
pub use error::{AzureClientError, AzureResult};
pub use events::ClientEvent;
pub use magic::{MagicArguments, MagicCommand, MagicError};
pub use packages::{InMemoryPackageLoader, PackageLoader};
pub use poll::{PollOutcome, poll_until, with_cancellation};
pub use submission::{SubmissionContext, SubmissionDefaults, decode_job_params};
