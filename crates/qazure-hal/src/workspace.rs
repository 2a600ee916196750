//! Workspace connection traits.
//!
//! A [`Workspace`] is a thin async façade over the remote service. It never
//! propagates transport errors: failures are logged by the implementation and
//! surfaced as `None` or an empty list, so callers tell "failed" apart from
//! "not found" by the shape of the return value.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::TokenProvider;
use crate::environment::AzureEnvironment;
use crate::job::{AzureJob, ProviderStatus, Quota, filter_jobs};
use crate::result::JobOutput;

/// Coordinates of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceParams {
    /// Azure subscription id.
    pub subscription_id: String,
    /// Resource group of the workspace.
    pub resource_group: String,
    /// Workspace name.
    pub name: String,
    /// Normalised location (e.g. `"westus"`).
    pub location: String,
    /// Storage account connection string, when the workspace has no linked
    /// storage or the user wants to override it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

/// Outcome of a single-job lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum JobLookup {
    /// The job exists.
    Found(AzureJob),
    /// The service reported no job with that id.
    NotFound,
    /// The service could not be reached or returned an unexpected error.
    Unavailable,
}

impl JobLookup {
    /// The job, if found.
    pub fn into_job(self) -> Option<AzureJob> {
        match self {
            JobLookup::Found(job) => Some(job),
            JobLookup::NotFound | JobLookup::Unavailable => None,
        }
    }
}

/// A job ready to be created on the service.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSubmission {
    /// Client-chosen job id.
    pub id: String,
    /// Friendly name.
    pub name: String,
    /// Target id.
    pub target: String,
    /// Provider id.
    pub provider: String,
    /// Format of `input_data`.
    pub input_data_format: String,
    /// Expected output format.
    pub output_data_format: String,
    /// Program payload uploaded to storage.
    pub input_data: Vec<u8>,
    /// Input parameters sent with the job (`entryPoint`, `arguments`, shots,
    /// provider parameters).
    pub input_params: serde_json::Map<String, serde_json::Value>,
}

/// Handle for submitting to one target.
#[async_trait]
pub trait QuantumMachine: Send + Sync {
    /// Target id this machine submits to.
    fn target_id(&self) -> &str;

    /// Upload the program and create the job. `None` on any failure.
    async fn submit(&self, submission: &JobSubmission) -> Option<AzureJob>;
}

/// A connected workspace.
#[async_trait]
pub trait Workspace: Send + Sync {
    /// Workspace coordinates.
    fn params(&self) -> &WorkspaceParams;

    /// Providers and their targets. `None` if the workspace could not be
    /// queried (unknown workspace, transport failure, authorization failure).
    async fn providers(&self) -> Option<Vec<ProviderStatus>>;

    /// Look up a job by id.
    async fn get_job(&self, job_id: &str) -> JobLookup;

    /// All jobs of the workspace.
    async fn jobs(&self) -> Option<Vec<AzureJob>>;

    /// Jobs matching `filter` (case-insensitive substring over id, name and
    /// target), newest first, at most `count`.
    async fn list_jobs(&self, filter: Option<&str>, count: Option<usize>) -> Option<Vec<AzureJob>> {
        let jobs = self.jobs().await?;
        Some(filter_jobs(jobs, filter, count))
    }

    /// Quotas of the workspace.
    async fn quotas(&self) -> Option<Vec<Quota>>;

    /// Machine handle for a target id.
    fn create_machine(&self, target_id: &str) -> Option<Arc<dyn QuantumMachine>>;

    /// Download and decode the output of a completed job.
    async fn job_output(&self, job: &AzureJob) -> Option<JobOutput>;
}

/// Opens workspaces for a given environment and credential.
#[async_trait]
pub trait WorkspaceFactory: Send + Sync {
    /// Build a workspace handle. `None` if the handle could not be built
    /// (the workspace itself is verified later by listing its providers).
    async fn open(
        &self,
        params: &WorkspaceParams,
        environment: &AzureEnvironment,
        credential: Arc<dyn TokenProvider>,
    ) -> Option<Arc<dyn Workspace>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lookup_into_job() {
        let job: AzureJob = serde_json::from_value(serde_json::json!({"id": "j"})).unwrap();
        assert_eq!(JobLookup::Found(job.clone()).into_job(), Some(job));
        assert_eq!(JobLookup::NotFound.into_job(), None);
        assert_eq!(JobLookup::Unavailable.into_job(), None);
    }
}
