//! Job, quota and provider-status types as reported by the remote service.
//!
//! The service owns job state; these types are read-only snapshots fetched
//! fresh on every status or result query.
//!
//! ```text
//!   submit ──→ Waiting ──→ Executing ──→ Succeeded
//!                │            │
//!                │            ├──→ Failed
//!                │            │
//!                └────────────┴──→ Cancelled
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a remote job, parsed from the service's status string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Accepted and waiting in the provider queue.
    Waiting,
    /// Running on the target.
    Executing,
    /// Finished and produced output.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled by the user or the provider.
    Cancelled,
    /// A status string this client does not recognise.
    Other(String),
}

impl JobStatus {
    /// Parse a service status string (case-insensitive).
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "waiting" | "queued" | "submitted" => JobStatus::Waiting,
            "executing" | "running" | "finishing" => JobStatus::Executing,
            "succeeded" | "completed" => JobStatus::Succeeded,
            "failed" => JobStatus::Failed,
            "cancelled" | "canceled" => JobStatus::Cancelled,
            _ => JobStatus::Other(status.to_string()),
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Check if the job completed successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Succeeded)
    }

    /// Canonical service spelling.
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Waiting => "Waiting",
            JobStatus::Executing => "Executing",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Failed => "Failed",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details attached to a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobErrorData {
    /// Provider error code.
    #[serde(default)]
    pub code: String,
    /// Provider error message.
    #[serde(default)]
    pub message: String,
}

/// A job in an Azure Quantum workspace.
///
/// Field names follow the service's `JobDetails` JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureJob {
    /// Job identifier.
    pub id: String,
    /// Friendly name given at submission.
    #[serde(default)]
    pub name: String,
    /// Status string as reported by the service.
    #[serde(default)]
    pub status: String,
    /// Provider id (e.g. `"ionq"`).
    #[serde(default)]
    pub provider_id: String,
    /// Target id (e.g. `"ionq.simulator"`).
    #[serde(default)]
    pub target: String,
    /// SAS URI of the job's storage container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_uri: Option<String>,
    /// SAS URI of the uploaded program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data_uri: Option<String>,
    /// Format of the uploaded program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data_format: Option<String>,
    /// Provider-specific input parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_params: Option<serde_json::Value>,
    /// SAS URI of the job output, available once succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data_uri: Option<String>,
    /// Format of the job output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data_format: Option<String>,
    /// Time the job was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    /// Time the job started executing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_execution_time: Option<DateTime<Utc>>,
    /// Time the job finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_execution_time: Option<DateTime<Utc>>,
    /// Error details for failed jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<JobErrorData>,
}

impl AzureJob {
    /// Parsed lifecycle state.
    pub fn state(&self) -> JobStatus {
        JobStatus::parse(&self.status)
    }

    /// Case-insensitive substring match over id, name and target.
    ///
    /// An empty filter matches every job.
    pub fn matches(&self, filter: &str) -> bool {
        if filter.is_empty() {
            return true;
        }
        let needle = filter.to_lowercase();
        [&self.id, &self.name, &self.target]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Apply the job-list filter and count limit.
///
/// Jobs are ordered newest first before truncation; jobs without a creation
/// time sort last.
pub fn filter_jobs(jobs: Vec<AzureJob>, filter: Option<&str>, count: Option<usize>) -> Vec<AzureJob> {
    let filter = filter.unwrap_or_default();
    let mut matched: Vec<AzureJob> = jobs.into_iter().filter(|j| j.matches(filter)).collect();
    matched.sort_by(|a, b| b.creation_time.cmp(&a.creation_time));
    if let Some(count) = count {
        matched.truncate(count);
    }
    matched
}

/// A quota entry of the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    /// Quota dimension (e.g. `"qgs"`).
    #[serde(default)]
    pub dimension: String,
    /// Scope (`"Subscription"` or `"Workspace"`).
    #[serde(default)]
    pub scope: String,
    /// Provider the quota applies to.
    #[serde(default)]
    pub provider_id: String,
    /// Amount consumed in the current period.
    #[serde(default)]
    pub utilization: f64,
    /// Amount reserved by queued jobs.
    #[serde(default)]
    pub holds: f64,
    /// Quota limit.
    #[serde(default)]
    pub limit: f64,
    /// Renewal period (`"Monthly"`, `"Infinite"`).
    #[serde(default)]
    pub period: String,
}

/// Availability of a single target as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStatus {
    /// Target id (e.g. `"ionq.qpu"`).
    pub id: String,
    /// `"Available"`, `"Degraded"` or `"Unavailable"`.
    #[serde(default)]
    pub current_availability: String,
    /// Average queue time in seconds.
    #[serde(default)]
    pub average_queue_time: i64,
    /// Provider status page, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_page: Option<String>,
}

/// A provider and its targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Provider id (e.g. `"ionq"`).
    pub id: String,
    /// Provider-level availability.
    #[serde(default)]
    pub current_availability: String,
    /// Targets offered by this provider.
    #[serde(default)]
    pub targets: Vec<TargetStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, name: &str, target: &str) -> AzureJob {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "status": "Succeeded",
            "providerId": "ionq",
            "target": target,
        }))
        .unwrap()
    }

    #[test]
    fn test_job_status_parse() {
        assert_eq!(JobStatus::parse("Waiting"), JobStatus::Waiting);
        assert_eq!(JobStatus::parse("EXECUTING"), JobStatus::Executing);
        assert_eq!(JobStatus::parse("succeeded"), JobStatus::Succeeded);
        assert_eq!(JobStatus::parse("canceled"), JobStatus::Cancelled);
        assert_eq!(
            JobStatus::parse("Paused"),
            JobStatus::Other("Paused".to_string())
        );
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Waiting.is_terminal());
        assert!(!JobStatus::Executing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Other("x".into()).is_terminal());
    }

    #[test]
    fn test_job_deserializes_service_json() {
        let job: AzureJob = serde_json::from_str(
            r#"{
                "id": "abc",
                "name": "hello",
                "status": "Executing",
                "providerId": "quantinuum",
                "target": "quantinuum.sim.h1-1e",
                "creationTime": "2024-01-02T03:04:05Z",
                "outputDataUri": "https://blob/out?sig=1"
            }"#,
        )
        .unwrap();
        assert_eq!(job.state(), JobStatus::Executing);
        assert_eq!(job.provider_id, "quantinuum");
        assert!(job.creation_time.is_some());
        assert_eq!(job.output_data_uri.as_deref(), Some("https://blob/out?sig=1"));
    }

    #[test]
    fn test_job_filter_is_case_insensitive() {
        let jobs = vec![job("JOB_ID_1", "first", "ionq.qpu"), job("JOB_ID_2", "second", "ionq.simulator")];

        assert_eq!(filter_jobs(jobs.clone(), Some("job_id_1"), None).len(), 1);
        assert_eq!(filter_jobs(jobs.clone(), Some("SIMULATOR"), None).len(), 1);
        assert_eq!(filter_jobs(jobs.clone(), Some(""), None).len(), 2);
        assert_eq!(filter_jobs(jobs.clone(), None, None).len(), 2);
        assert!(filter_jobs(jobs, Some("invalid"), None).is_empty());
    }

    #[test]
    fn test_job_filter_count_keeps_newest() {
        let mut older = job("a", "older", "ionq.qpu");
        older.creation_time = "2024-01-01T00:00:00Z".parse().ok();
        let mut newer = job("b", "newer", "ionq.qpu");
        newer.creation_time = "2024-06-01T00:00:00Z".parse().ok();

        let listed = filter_jobs(vec![older, newer], None, Some(1));
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "b");
    }
}
