//! Azure Quantum core types
//!
//! This crate provides the building blocks the job-submission client is
//! assembled from: credentials, deployment environments, execution targets,
//! and the workspace interface implemented by the service adapters.
//!
//! # Overview
//!
//! - [`CredentialResolver`] turns a [`CredentialType`] into a [`TokenProvider`]
//! - [`EnvironmentResolver`] maps `AZURE_QUANTUM_ENV` to an [`AzureEnvironment`]
//!   and discovers dogfood authorities
//! - [`ExecutionTarget`] parses target ids into a provider, the client package
//!   it needs, and its [`TargetCapability`]
//! - [`Workspace`] and [`QuantumMachine`] describe a connected workspace
//! - [`OutputChannel`] and [`LoginPrompt`] carry user-facing output
//!
//! # Supported Environments
//!
//! | `AZURE_QUANTUM_ENV` | Endpoint | Authority |
//! |---------------------|----------|-----------|
//! | `production` (default) | `https://{location}.quantum.azure.com/` | `login.microsoftonline.com/organizations` |
//! | `canary` | `https://eastus2euap.quantum.azure.com/` | `login.microsoftonline.com/organizations` |
//! | `dogfood` / `test` | `https://{location}.quantum-test.azure.com/` | discovered per subscription |
//! | `mock` | in-memory | none |
//!
//! # Example: Resolving a Target
//!
//! ```
//! use qazure_hal::{ExecutionTarget, TargetCapability};
//!
//! let target = ExecutionTarget::create("ionq.simulator").unwrap();
//! assert_eq!(target.package_name, "Microsoft.Quantum.Providers.IonQ");
//! assert_eq!(target.capability, TargetCapability::BasicQuantumFunctionality);
//! assert!(ExecutionTarget::create("contoso.qpu").is_none());
//! ```

pub mod auth;
pub mod capability;
pub mod environment;
pub mod error;
pub mod job;
pub mod output;
pub mod result;
pub mod target;
pub mod workspace;

pub use auth::{
    CachedToken, ChainedTokenProvider, CredentialResolver, CredentialType, StaticTokenProvider,
    TokenCache, TokenProvider,
};
pub use capability::TargetCapability;
pub use environment::{
    AuthorityCache, AzureEnvironment, EnvironmentKind, EnvironmentResolver, NormalizedLocation,
    normalize_location,
};
pub use error::{HalError, HalResult};
pub use job::{AzureJob, JobErrorData, JobStatus, ProviderStatus, Quota, TargetStatus, filter_jobs};
pub use output::{BufferedChannel, LoginInstructions, LoginPrompt, OutputChannel, UpdatableDisplay};
pub use result::{Histogram, JobOutput};
pub use target::{ExecutionTarget, PACKAGE_PREFIX, Provider};
pub use workspace::{
    JobLookup, JobSubmission, QuantumMachine, Workspace, WorkspaceFactory, WorkspaceParams,
};
