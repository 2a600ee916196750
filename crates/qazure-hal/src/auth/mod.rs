//! Credential resolution.
//!
//! A [`CredentialType`] selects how access tokens for the workspace are
//! obtained. [`CredentialResolver::resolve`] turns that choice into a
//! [`TokenProvider`]; it never fails loudly. A strategy that cannot work in
//! the current environment resolves to `None`, and a strategy that fails at
//! token time returns an error from [`TokenProvider::get_token`]. The caller
//! maps both to an authentication failure.
//!
//! # Example
//!
//! ```ignore
//! use qazure_hal::auth::{CredentialResolver, CredentialType, TokenCache};
//! use qazure_hal::environment::AzureEnvironment;
//!
//! let cache = Arc::new(TokenCache::open(TokenCache::default_dir()));
//! let resolver = CredentialResolver::new(Some(cache), prompt)?;
//! let credential = resolver
//!     .resolve(CredentialType::DeviceCode, &AzureEnvironment::production())
//!     .ok_or("no credential")?;
//! let token = credential.get_token().await?;
//! ```

mod cache;
mod cli;
mod device_code;
mod environment;
mod interactive;
mod managed_identity;
mod oauth;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::environment::AzureEnvironment;
use crate::error::{HalError, HalResult};
use crate::output::LoginPrompt;

pub use cache::{
    CACHE_DIR_VAR, CACHE_FILE, CacheRecord, CachedCredential, TokenCache, UNENCRYPTED_CACHE_FILE,
};
pub use cli::AzureCliCredential;
pub use device_code::DeviceCodeCredential;
pub use environment::{EnvironmentCredential, ServicePrincipal};
pub use interactive::InteractiveCredential;
pub use managed_identity::ManagedIdentityCredential;
pub use oauth::{AuthorityEndpoints, default_scope};

/// Token acquisition strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CredentialType {
    /// Silent cache reuse, then environment, CLI and interactive login.
    #[default]
    Default,
    /// Service principal from `AZURE_CLIENT_ID`/`AZURE_TENANT_ID`/`AZURE_CLIENT_SECRET`.
    Environment,
    /// Managed identity of the host.
    ManagedIdentity,
    /// Cached login of the Azure CLI.
    Cli,
    /// Browser login with a loopback redirect.
    Interactive,
    /// Device-code login.
    DeviceCode,
}

impl CredentialType {
    /// All strategies.
    pub const ALL: [CredentialType; 6] = [
        CredentialType::Default,
        CredentialType::Environment,
        CredentialType::ManagedIdentity,
        CredentialType::Cli,
        CredentialType::Interactive,
        CredentialType::DeviceCode,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            CredentialType::Default => "Default",
            CredentialType::Environment => "Environment",
            CredentialType::ManagedIdentity => "ManagedIdentity",
            CredentialType::Cli => "CLI",
            CredentialType::Interactive => "Interactive",
            CredentialType::DeviceCode => "DeviceCode",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CredentialType {
    type Err = HalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "default" | "" => Ok(CredentialType::Default),
            "environment" | "env" => Ok(CredentialType::Environment),
            "managedidentity" => Ok(CredentialType::ManagedIdentity),
            "cli" | "azurecli" => Ok(CredentialType::Cli),
            "interactive" | "browser" => Ok(CredentialType::Interactive),
            "devicecode" => Ok(CredentialType::DeviceCode),
            _ => Err(HalError::Configuration(format!(
                "Unknown credential type: {s}"
            ))),
        }
    }
}

/// Cached token with metadata.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedToken {
    /// Access token.
    pub access_token: String,

    /// Refresh token (if available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer").
    pub token_type: String,

    /// Expiration time (Unix timestamp).
    pub expires_at: u64,

    /// Scopes granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl CachedToken {
    /// Check if the token is expired.
    pub fn is_expired(&self) -> bool {
        oauth::now_secs() >= self.expires_at
    }

    /// Check if the token will expire soon (within buffer).
    pub fn expires_soon(&self, buffer_secs: u64) -> bool {
        oauth::now_secs() + buffer_secs >= self.expires_at
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Refresh tokens this many seconds before they expire.
pub const REFRESH_BUFFER_SECS: u64 = 300;

/// Token provider trait for dependency injection.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Get a valid access token.
    async fn get_token(&self) -> HalResult<String>;

    /// Check if a token is available without a network call.
    fn has_valid_token(&self) -> bool;
}

/// Provider returning a fixed token. Used by the mock environment.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> HalResult<String> {
        Ok(self.token.clone())
    }

    fn has_valid_token(&self) -> bool {
        true
    }
}

/// Tries each provider in order; the first one to produce a token is used for
/// all later calls.
pub struct ChainedTokenProvider {
    sources: Vec<(&'static str, Arc<dyn TokenProvider>)>,
    selected: RwLock<Option<usize>>,
}

impl ChainedTokenProvider {
    /// Create a chain from named providers.
    pub fn new(sources: Vec<(&'static str, Arc<dyn TokenProvider>)>) -> Self {
        Self {
            sources,
            selected: RwLock::new(None),
        }
    }

    /// Name of the provider that produced the last token.
    pub fn selected(&self) -> Option<&'static str> {
        let selected = *self.selected.read().unwrap_or_else(PoisonError::into_inner);
        selected.and_then(|i| self.sources.get(i)).map(|(name, _)| *name)
    }
}

#[async_trait]
impl TokenProvider for ChainedTokenProvider {
    async fn get_token(&self) -> HalResult<String> {
        let selected = *self.selected.read().unwrap_or_else(PoisonError::into_inner);
        if let Some((name, source)) = selected.and_then(|i| self.sources.get(i)) {
            match source.get_token().await {
                Ok(token) => return Ok(token),
                Err(e) => debug!(source = name, error = %e, "selected credential failed"),
            }
        }

        let mut failures = Vec::new();
        for (index, (name, source)) in self.sources.iter().enumerate() {
            match source.get_token().await {
                Ok(token) => {
                    debug!(source = name, "credential selected");
                    *self.selected.write().unwrap_or_else(PoisonError::into_inner) = Some(index);
                    return Ok(token);
                }
                Err(e) => {
                    debug!(source = name, error = %e, "credential unavailable");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        Err(HalError::AuthenticationFailed(format!(
            "No credential in the chain produced a token ({})",
            failures.join("; ")
        )))
    }

    fn has_valid_token(&self) -> bool {
        self.sources.iter().any(|(_, s)| s.has_valid_token())
    }
}

/// Builds token providers for a [`CredentialType`].
pub struct CredentialResolver {
    client: reqwest::Client,
    cache: Option<Arc<TokenCache>>,
    prompt: Arc<dyn LoginPrompt>,
}

impl CredentialResolver {
    /// Create a resolver. Tokens of user logins are persisted in `cache`.
    pub fn new(cache: Option<Arc<TokenCache>>, prompt: Arc<dyn LoginPrompt>) -> HalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HalError::Auth(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache,
            prompt,
        })
    }

    /// Provider for `kind` in `environment`, or `None` if the strategy is
    /// unusable here.
    pub fn resolve(
        &self,
        kind: CredentialType,
        environment: &AzureEnvironment,
    ) -> Option<Arc<dyn TokenProvider>> {
        if environment.is_mock() {
            return Some(Arc::new(StaticTokenProvider::new("mock-access-token")));
        }

        let endpoints = AuthorityEndpoints::new(environment.authority_or_default());
        match kind {
            CredentialType::Environment => match ServicePrincipal::from_env() {
                Some(sp) => Some(Arc::new(EnvironmentCredential::new(
                    self.client.clone(),
                    sp,
                    endpoints,
                    &environment.scopes,
                ))),
                None => {
                    warn!("Environment credential requested but AZURE_CLIENT_ID, AZURE_TENANT_ID or AZURE_CLIENT_SECRET is not set");
                    None
                }
            },
            CredentialType::ManagedIdentity => Some(Arc::new(ManagedIdentityCredential::from_env(
                self.client.clone(),
                &environment.scopes,
            ))),
            CredentialType::Cli => Some(Arc::new(AzureCliCredential::new(&environment.scopes))),
            CredentialType::Interactive => {
                Some(Arc::new(self.interactive(environment, endpoints)))
            }
            CredentialType::DeviceCode => Some(Arc::new(DeviceCodeCredential::new(
                self.cached(environment, endpoints.clone()),
                Arc::clone(&self.prompt),
            ))),
            CredentialType::Default => {
                let mut sources: Vec<(&'static str, Arc<dyn TokenProvider>)> = vec![(
                    "cache",
                    Arc::new(self.cached(environment, endpoints.clone())),
                )];
                if let Some(sp) = ServicePrincipal::from_env() {
                    sources.push((
                        "environment",
                        Arc::new(EnvironmentCredential::new(
                            self.client.clone(),
                            sp,
                            endpoints.clone(),
                            &environment.scopes,
                        )),
                    ));
                }
                sources.push(("cli", Arc::new(AzureCliCredential::new(&environment.scopes))));
                sources.push(("interactive", Arc::new(self.interactive(environment, endpoints))));
                Some(Arc::new(ChainedTokenProvider::new(sources)))
            }
        }
    }

    fn cached(&self, environment: &AzureEnvironment, endpoints: AuthorityEndpoints) -> CachedCredential {
        CachedCredential::new(
            self.client.clone(),
            self.cache.clone(),
            endpoints,
            &environment.client_id,
            &environment.scopes,
        )
    }

    fn interactive(
        &self,
        environment: &AzureEnvironment,
        endpoints: AuthorityEndpoints,
    ) -> InteractiveCredential {
        InteractiveCredential::new(
            self.cached(environment, endpoints),
            Arc::clone(&self.prompt),
        )
    }
}
