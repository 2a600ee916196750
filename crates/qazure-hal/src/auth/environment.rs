//! Service-principal credential from environment variables.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::instrument;

use super::oauth::{self, AuthorityEndpoints};
use super::{CachedToken, REFRESH_BUFFER_SECS, TokenProvider};
use crate::error::{HalError, HalResult};

/// Client id variable.
pub const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
/// Tenant id variable.
pub const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
/// Client secret variable.
pub const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";

/// Service principal identity.
#[derive(Clone, PartialEq, Eq)]
pub struct ServicePrincipal {
    /// Application (client) id.
    pub client_id: String,
    /// Directory (tenant) id.
    pub tenant_id: String,
    /// Client secret.
    pub client_secret: String,
}

impl ServicePrincipal {
    /// Read `AZURE_CLIENT_ID`, `AZURE_TENANT_ID` and `AZURE_CLIENT_SECRET`.
    /// `None` unless all three are set and non-empty.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Some(Self {
            client_id: get(CLIENT_ID_VAR)?,
            tenant_id: get(TENANT_ID_VAR)?,
            client_secret: get(CLIENT_SECRET_VAR)?,
        })
    }
}

impl fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Client-credentials grant for a service principal.
pub struct EnvironmentCredential {
    client: reqwest::Client,
    principal: ServicePrincipal,
    endpoints: AuthorityEndpoints,
    scope: String,
    token: RwLock<Option<CachedToken>>,
}

impl EnvironmentCredential {
    /// Create a credential. The tenant of `principal` replaces the tenant of
    /// `endpoints`; the scope requested is the `.default` scope of the first
    /// of `scopes`.
    pub fn new(
        client: reqwest::Client,
        principal: ServicePrincipal,
        endpoints: AuthorityEndpoints,
        scopes: &[String],
    ) -> Self {
        let endpoints = endpoints.for_tenant(&principal.tenant_id);
        let scope = scopes
            .first()
            .map(|s| oauth::default_scope(s))
            .unwrap_or_default();
        Self {
            client,
            principal,
            endpoints,
            scope,
            token: RwLock::new(None),
        }
    }

    #[instrument(skip(self), fields(client_id = %self.principal.client_id))]
    async fn request(&self) -> HalResult<CachedToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.principal.client_id.as_str()),
            ("client_secret", self.principal.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        Ok(oauth::request_token(&self.client, &self.endpoints.token_endpoint(), &params).await?)
    }
}

#[async_trait]
impl TokenProvider for EnvironmentCredential {
    async fn get_token(&self) -> HalResult<String> {
        if let Some(token) = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|t| !t.expires_soon(REFRESH_BUFFER_SECS))
        {
            return Ok(token.access_token.clone());
        }

        let token = self.request().await?;
        let access_token = token.access_token.clone();
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(access_token)
    }

    fn has_valid_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_expired())
    }
}
