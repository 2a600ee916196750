//! Error types for the Azure Quantum adapter.

use thiserror::Error;

/// Result type for Azure Quantum REST operations.
pub type AzureApiResult<T> = Result<T, AzureApiError>;

/// Errors that can occur when talking to the Azure Quantum service.
#[derive(Debug, Error)]
pub enum AzureApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No access token could be obtained.
    #[error("Failed to acquire access token: {0}")]
    Credential(#[from] qazure_hal::HalError),

    /// The service rejected the access token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource (workspace, job, blob) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// API error response.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// Blob storage request failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Storage connection string could not be used.
    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),
}

impl From<AzureApiError> for qazure_hal::HalError {
    fn from(e: AzureApiError) -> Self {
        match e {
            AzureApiError::Credential(inner) => inner,
            AzureApiError::Unauthorized(_) => {
                qazure_hal::HalError::AuthenticationFailed(e.to_string())
            }
            AzureApiError::InvalidConnectionString(_) => {
                qazure_hal::HalError::Configuration(e.to_string())
            }
            AzureApiError::Http(inner) => qazure_hal::HalError::Network(inner),
            AzureApiError::Json(inner) => qazure_hal::HalError::Serialization(inner),
            _ => qazure_hal::HalError::Backend(e.to_string()),
        }
    }
}
