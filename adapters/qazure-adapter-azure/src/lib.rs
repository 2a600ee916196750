//! Azure Quantum REST Adapter
//!
//! This crate implements the [`Workspace`] interface against the Azure Quantum
//! data-plane REST API
//! (`https://{location}.quantum.azure.com/v1.0/subscriptions/.../workspaces/{name}/`).
//!
//! # Operations
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | Providers and targets | `GET providerStatus` |
//! | Job lookup | `GET jobs/{id}` |
//! | Job listing | `GET jobs` (paged via `nextLink`) |
//! | Quotas | `GET quotas` (paged) |
//! | Container SAS | `POST storage/sasUri` |
//! | Job creation | `PUT jobs/{id}` |
//!
//! # Storage
//!
//! Each job gets a container `job-{id}` holding the uploaded program
//! (`inputData`) and the output written by the provider. Container SAS URIs
//! come from the workspace's linked storage account unless a connection
//! string carrying a `SharedAccessSignature` is supplied at connect time.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use qazure_adapter_azure::AzureWorkspaceFactory;
//! use qazure_hal::{AzureEnvironment, StaticTokenProvider, WorkspaceFactory, WorkspaceParams};
//!
//! #[tokio::main]
//! async fn main() {
//!     let params = WorkspaceParams {
//!         subscription_id: "00000000-0000-0000-0000-000000000000".into(),
//!         resource_group: "rg".into(),
//!         name: "ws".into(),
//!         location: "westus".into(),
//!         storage: None,
//!     };
//!     let credential = Arc::new(StaticTokenProvider::new("token"));
//!     let ws = AzureWorkspaceFactory
//!         .open(&params, &AzureEnvironment::production(), credential)
//!         .await
//!         .unwrap();
//!     println!("{:?}", ws.providers().await);
//! }
//! ```

mod api;
mod error;
pub mod storage;
mod workspace;

pub use api::{API_VERSION, JobDetails, QuantumApiClient};
pub use error::{AzureApiError, AzureApiResult};
pub use storage::ConnectionString;
pub use workspace::{AzureMachine, AzureWorkspace, AzureWorkspaceFactory, INPUT_BLOB};

// Re-export common types for convenience.
pub use qazure_hal::{Workspace, WorkspaceFactory, WorkspaceParams};
