//! Error types for the HAL crate.

use thiserror::Error;

/// Errors that can occur in HAL operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HalError {
    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A credential strategy cannot be used in this environment
    /// (missing variables, no CLI installed, no managed identity endpoint).
    #[error("Credential unavailable: {0}")]
    CredentialUnavailable(String),

    /// Authentication error (OAuth, token, etc.).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The subscription's home authority could not be discovered.
    #[error("Authority discovery failed for subscription {subscription}: {reason}")]
    AuthorityDiscovery {
        /// Subscription the discovery call was made for.
        subscription: String,
        /// Why the challenge could not be used.
        reason: String,
    },

    /// Token cache I/O error.
    #[error("Token cache error: {0}")]
    TokenCache(String),

    /// Network error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for HAL operations.
pub type HalResult<T> = Result<T, HalError>;
