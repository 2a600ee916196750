//! Client error taxonomy.
//!
//! Every orchestrator operation returns one of these instead of propagating
//! collaborator errors. Each variant has a stable name and numeric code that
//! front ends report alongside the message.

use thiserror::Error;

/// Result type for [`AzureClient`](crate::AzureClient) operations.
pub type AzureResult<T> = Result<T, AzureClientError>;

/// Errors reported by the Azure Quantum client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AzureClientError {
    /// No workspace connection exists yet.
    #[error("Not connected to any Azure Quantum workspace.")]
    NotConnected,

    /// No execution target has been selected.
    #[error("No execution target has been specified.")]
    NoTarget,

    /// The requested target is unknown or not offered by the workspace.
    #[error("Target {0} is not available in the current Azure Quantum workspace.")]
    InvalidTarget(String),

    /// No job with the given id exists.
    #[error("No job with id {0} was found in the current Azure Quantum workspace.")]
    JobNotFound(String),

    /// The job has not reached a terminal state.
    #[error("Job {0} has not completed yet.")]
    JobNotCompleted(String),

    /// The job output could not be downloaded or decoded.
    #[error("Failed to download the results of job {0}.")]
    JobOutputDownloadFailed(String),

    /// Submission without an operation name.
    #[error("No operation name was specified.")]
    NoOperationName,

    /// The operation name does not resolve to a known program.
    #[error("The operation {0} was not recognized.")]
    UnrecognizedOperationName(String),

    /// The entry point cannot run on the active target.
    #[error("Invalid entry point: {0}")]
    InvalidEntryPoint(String),

    /// The job could not be created.
    #[error("Failed to submit the job: {0}")]
    JobSubmissionFailed(String),

    /// No access token could be obtained.
    #[error("Failed to authenticate to Azure Quantum: {0}")]
    AuthenticationFailed(String),

    /// The workspace does not exist or could not be reached.
    #[error("Azure Quantum workspace not found: {0}")]
    WorkspaceNotFound(String),

    /// Connect without a location.
    #[error("No workspace location was specified.")]
    NoWorkspaceLocation,

    /// The location is empty after normalisation.
    #[error("Invalid workspace location: \"{0}\"")]
    InvalidWorkspaceLocation(String),

    /// The job finished without succeeding.
    #[error("Job {0} failed or was cancelled.")]
    JobFailedOrCancelled(String),

    /// Unexpected collaborator failure.
    #[error("Unexpected error: {0}")]
    UnknownError(String),

    /// The job did not finish within the execution timeout.
    #[error("Timed out after {timeout_secs}s waiting for job {job_id}; it keeps running in the workspace.")]
    JobExecutionTimedOut {
        /// Job still running remotely.
        job_id: String,
        /// Timeout that elapsed.
        timeout_secs: u64,
    },

    /// Waiting for the job was cancelled.
    #[error("Stopped waiting for job {0}; it keeps running in the workspace.")]
    JobExecutionCancelled(String),

    /// A non-execute operation was cancelled.
    #[error("The operation was cancelled.")]
    OperationCancelled,

    /// Unrecoverable environment configuration problem.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested capability name is not a known level.
    #[error("Unknown target capability {0}.")]
    InvalidTargetCapability(String),
}

impl AzureClientError {
    /// Stable variant name (e.g. `"NotConnected"`).
    pub fn name(&self) -> &'static str {
        match self {
            AzureClientError::NotConnected => "NotConnected",
            AzureClientError::NoTarget => "NoTarget",
            AzureClientError::InvalidTarget(_) => "InvalidTarget",
            AzureClientError::JobNotFound(_) => "JobNotFound",
            AzureClientError::JobNotCompleted(_) => "JobNotCompleted",
            AzureClientError::JobOutputDownloadFailed(_) => "JobOutputDownloadFailed",
            AzureClientError::NoOperationName => "NoOperationName",
            AzureClientError::UnrecognizedOperationName(_) => "UnrecognizedOperationName",
            AzureClientError::InvalidEntryPoint(_) => "InvalidEntryPoint",
            AzureClientError::JobSubmissionFailed(_) => "JobSubmissionFailed",
            AzureClientError::AuthenticationFailed(_) => "AuthenticationFailed",
            AzureClientError::WorkspaceNotFound(_) => "WorkspaceNotFound",
            AzureClientError::NoWorkspaceLocation => "NoWorkspaceLocation",
            AzureClientError::InvalidWorkspaceLocation(_) => "InvalidWorkspaceLocation",
            AzureClientError::JobFailedOrCancelled(_) => "JobFailedOrCancelled",
            AzureClientError::UnknownError(_) => "UnknownError",
            AzureClientError::JobExecutionTimedOut { .. } => "JobExecutionTimedOut",
            AzureClientError::JobExecutionCancelled(_) => "JobExecutionCancelled",
            AzureClientError::OperationCancelled => "OperationCancelled",
            AzureClientError::Configuration(_) => "Configuration",
            AzureClientError::InvalidTargetCapability(_) => "InvalidTargetCapability",
        }
    }

    /// Stable numeric code.
    pub fn code(&self) -> u32 {
        match self {
            AzureClientError::NotConnected => 1,
            AzureClientError::NoTarget => 2,
            AzureClientError::InvalidTarget(_) => 3,
            AzureClientError::JobNotFound(_) => 4,
            AzureClientError::JobNotCompleted(_) => 5,
            AzureClientError::JobOutputDownloadFailed(_) => 6,
            AzureClientError::NoOperationName => 7,
            AzureClientError::UnrecognizedOperationName(_) => 8,
            AzureClientError::InvalidEntryPoint(_) => 9,
            AzureClientError::JobSubmissionFailed(_) => 10,
            AzureClientError::AuthenticationFailed(_) => 11,
            AzureClientError::WorkspaceNotFound(_) => 12,
            AzureClientError::NoWorkspaceLocation => 13,
            AzureClientError::InvalidWorkspaceLocation(_) => 14,
            AzureClientError::JobFailedOrCancelled(_) => 15,
            AzureClientError::UnknownError(_) => 16,
            AzureClientError::JobExecutionTimedOut { .. } => 17,
            AzureClientError::JobExecutionCancelled(_) => 18,
            AzureClientError::OperationCancelled => 19,
            AzureClientError::Configuration(_) => 20,
            AzureClientError::InvalidTargetCapability(_) => 21,
        }
    }

    /// Generic description of the error class, without instance details.
    pub fn description(&self) -> &'static str {
        match self {
            AzureClientError::NotConnected => {
                "Not connected to any Azure Quantum workspace. Connect with %azure.connect first."
            }
            AzureClientError::NoTarget => {
                "No execution target has been specified. Select one with %azure.target."
            }
            AzureClientError::InvalidTarget(_) => {
                "The specified target is not enabled in this workspace or is not supported."
            }
            AzureClientError::JobNotFound(_) => {
                "No job with the given ID was found in the current workspace."
            }
            AzureClientError::JobNotCompleted(_) => "The job has not yet completed.",
            AzureClientError::JobOutputDownloadFailed(_) => {
                "Failed to download results for the specified job."
            }
            AzureClientError::NoOperationName => "No operation name was specified.",
            AzureClientError::UnrecognizedOperationName(_) => {
                "The specified operation name was not recognized."
            }
            AzureClientError::InvalidEntryPoint(_) => {
                "The operation cannot be compiled for the capabilities of the active target."
            }
            AzureClientError::JobSubmissionFailed(_) => "Failed to submit the job to the workspace.",
            AzureClientError::AuthenticationFailed(_) => "Authentication with Azure failed.",
            AzureClientError::WorkspaceNotFound(_) => {
                "No Azure Quantum workspace was found that matches the specified criteria."
            }
            AzureClientError::NoWorkspaceLocation => "No workspace location was specified.",
            AzureClientError::InvalidWorkspaceLocation(_) => {
                "The specified workspace location is invalid."
            }
            AzureClientError::JobFailedOrCancelled(_) => "The job failed or was cancelled.",
            AzureClientError::UnknownError(_) => "An unknown error occurred.",
            AzureClientError::JobExecutionTimedOut { .. } => {
                "The job did not complete within the execution timeout."
            }
            AzureClientError::JobExecutionCancelled(_) => "Waiting for the job was cancelled.",
            AzureClientError::OperationCancelled => "The operation was cancelled.",
            AzureClientError::Configuration(_) => "The environment configuration is invalid.",
            AzureClientError::InvalidTargetCapability(_) => {
                "The specified target capability is not recognized."
            }
        }
    }

    /// Whether the error stems from configuration that retrying cannot fix.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AzureClientError::Configuration(_))
    }
}
