//! Deployment environments.
//!
//! Maps the `AZURE_QUANTUM_ENV` selector to the service endpoint, client
//! application and auth scopes of a deployment. The dogfood environment has
//! no fixed authority; the subscription's home tenant is discovered from the
//! resource manager's `WWW-Authenticate` challenge and cached per
//! subscription for the life of the [`AuthorityCache`].

use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use std::time::Duration;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{HalError, HalResult};

/// Environment variable selecting the deployment.
pub const ENVIRONMENT_VAR: &str = "AZURE_QUANTUM_ENV";

/// Location used when the requested one is not a valid hostname label.
pub const DEFAULT_LOCATION: &str = "westus";

/// Authority used outside dogfood.
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/organizations";

/// Resource manager endpoint queried for authority discovery.
pub const MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

const PRODUCTION_CLIENT_ID: &str = "84ba0947-6c53-4dd2-9ca9-b3694761521b";
const DOGFOOD_CLIENT_ID: &str = "46a998aa-43d0-4281-9cbb-5709a507ac36";
const PRODUCTION_SCOPE: &str = "https://quantum.microsoft.com/Jobs.ReadWrite";
const DOGFOOD_SCOPE: &str = "api://dogfood.azure-quantum/Jobs.ReadWrite";
const CANARY_LOCATION: &str = "eastus2euap";

static HOSTNAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?$").expect("Invalid hostname regex")
});

static AUTHORIZATION_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"authorization_uri\s*=\s*"([^"]*)""#).expect("Invalid challenge regex")
});

/// Deployment kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentKind {
    /// Public Azure Quantum.
    #[default]
    Production,
    /// Pre-release deployment in a single fixed region.
    Canary,
    /// Internal test deployment.
    Dogfood,
    /// In-memory workspaces; no network access.
    Mock,
}

impl EnvironmentKind {
    /// Parse a selector. Unknown or absent values select production.
    pub fn parse(selector: Option<&str>) -> Self {
        match selector.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("canary") => EnvironmentKind::Canary,
            Some("dogfood") | Some("test") => EnvironmentKind::Dogfood,
            Some("mock") => EnvironmentKind::Mock,
            _ => EnvironmentKind::Production,
        }
    }

    /// Read the selector from `AZURE_QUANTUM_ENV`.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENVIRONMENT_VAR).ok().as_deref())
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            EnvironmentKind::Production => "production",
            EnvironmentKind::Canary => "canary",
            EnvironmentKind::Dogfood => "dogfood",
            EnvironmentKind::Mock => "mock",
        }
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint and authentication settings of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureEnvironment {
    /// Deployment kind.
    pub kind: EnvironmentKind,
    /// Client application id used for user logins.
    pub client_id: String,
    /// Scopes requested for data-plane access.
    pub scopes: Vec<String>,
    /// Base URI template; `{location}` is replaced by the workspace location.
    pub base_uri_template: String,
    /// Authentication authority. `None` until discovered (dogfood).
    pub authority: Option<String>,
}

impl AzureEnvironment {
    /// Public Azure Quantum.
    pub fn production() -> Self {
        Self {
            kind: EnvironmentKind::Production,
            client_id: PRODUCTION_CLIENT_ID.to_string(),
            scopes: vec![PRODUCTION_SCOPE.to_string()],
            base_uri_template: "https://{location}.quantum.azure.com/".to_string(),
            authority: Some(DEFAULT_AUTHORITY.to_string()),
        }
    }

    /// Canary: production settings pinned to one region.
    pub fn canary() -> Self {
        Self {
            kind: EnvironmentKind::Canary,
            base_uri_template: format!("https://{CANARY_LOCATION}.quantum.azure.com/"),
            ..Self::production()
        }
    }

    /// Internal test deployment. The authority is resolved per subscription.
    pub fn dogfood() -> Self {
        Self {
            kind: EnvironmentKind::Dogfood,
            client_id: DOGFOOD_CLIENT_ID.to_string(),
            scopes: vec![DOGFOOD_SCOPE.to_string()],
            base_uri_template: "https://{location}.quantum-test.azure.com/".to_string(),
            authority: None,
        }
    }

    /// In-memory environment used by tests.
    pub fn mock() -> Self {
        Self {
            kind: EnvironmentKind::Mock,
            authority: None,
            ..Self::production()
        }
    }

    /// Descriptor for a kind.
    pub fn for_kind(kind: EnvironmentKind) -> Self {
        match kind {
            EnvironmentKind::Production => Self::production(),
            EnvironmentKind::Canary => Self::canary(),
            EnvironmentKind::Dogfood => Self::dogfood(),
            EnvironmentKind::Mock => Self::mock(),
        }
    }

    /// Service base URI for a normalised location.
    pub fn base_uri(&self, location: &str) -> String {
        self.base_uri_template.replace("{location}", location)
    }

    /// Whether this is the mock environment.
    pub fn is_mock(&self) -> bool {
        self.kind == EnvironmentKind::Mock
    }

    /// Authority to authenticate against, falling back to the default.
    pub fn authority_or_default(&self) -> &str {
        self.authority.as_deref().unwrap_or(DEFAULT_AUTHORITY)
    }

    /// Replace the authority.
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }
}

/// Subscription id to authority URI.
///
/// Append-only: the first authority recorded for a subscription is kept.
#[derive(Debug, Default)]
pub struct AuthorityCache {
    entries: RwLock<FxHashMap<String, String>>,
}

impl AuthorityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached authority for a subscription.
    pub fn get(&self, subscription_id: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subscription_id)
            .cloned()
    }

    /// Record an authority. Returns the authority now cached.
    pub fn insert(&self, subscription_id: &str, authority: String) -> String {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(subscription_id.to_string())
            .or_insert(authority)
            .clone()
    }

    /// Number of cached subscriptions.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves environment descriptors.
pub struct EnvironmentResolver {
    client: reqwest::Client,
    cache: Arc<AuthorityCache>,
    management_endpoint: String,
}

impl EnvironmentResolver {
    /// Create a resolver sharing `cache`.
    pub fn new(cache: Arc<AuthorityCache>) -> HalResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| HalError::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache,
            management_endpoint: MANAGEMENT_ENDPOINT.to_string(),
        })
    }

    /// Override the resource manager endpoint.
    pub fn with_management_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.management_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Shared authority cache.
    pub fn cache(&self) -> &Arc<AuthorityCache> {
        &self.cache
    }

    /// Descriptor for a selector (see [`EnvironmentKind::parse`]).
    pub fn create(&self, selector: Option<&str>) -> AzureEnvironment {
        AzureEnvironment::for_kind(EnvironmentKind::parse(selector))
    }

    /// Descriptor with the authority filled in for `subscription_id`.
    ///
    /// Only dogfood performs discovery; its failure is a configuration error
    /// and is not retried.
    pub async fn resolve(
        &self,
        selector: Option<&str>,
        subscription_id: &str,
    ) -> HalResult<AzureEnvironment> {
        let environment = self.create(selector);
        if environment.kind != EnvironmentKind::Dogfood {
            return Ok(environment);
        }
        let authority = self.resolve_authority(subscription_id).await?;
        Ok(environment.with_authority(authority))
    }

    /// Home authority of a subscription, from cache or discovery.
    #[instrument(skip(self))]
    pub async fn resolve_authority(&self, subscription_id: &str) -> HalResult<String> {
        if let Some(authority) = self.cache.get(subscription_id) {
            debug!(authority = %authority, "authority cache hit");
            return Ok(authority);
        }

        let discovery_error = |reason: String| HalError::AuthorityDiscovery {
            subscription: subscription_id.to_string(),
            reason,
        };
        let url = discovery_url(&self.management_endpoint, subscription_id).map_err(discovery_error)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| discovery_error(format!("request failed: {e}")))?;

        let challenge = response
            .headers()
            .get(reqwest::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| discovery_error("response has no WWW-Authenticate header".into()))?;

        let authority = parse_authorization_uri(challenge)
            .ok_or_else(|| discovery_error("challenge has no authorization_uri".into()))?;

        debug!(authority = %authority, "authority discovered");
        Ok(self.cache.insert(subscription_id, authority))
    }
}

/// Management URL of a subscription, with the id encoded as one path segment.
fn discovery_url(endpoint: &str, subscription_id: &str) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(endpoint).map_err(|e| format!("invalid management endpoint: {e}"))?;
    url.path_segments_mut()
        .map_err(|()| format!("management endpoint {endpoint} cannot carry a path"))?
        .pop_if_empty()
        .extend(["subscriptions", subscription_id]);
    url.query_pairs_mut().append_pair("api-version", "2018-01-01");
    Ok(url)
}

/// Extract the `authorization_uri` parameter of a bearer challenge.
pub fn parse_authorization_uri(challenge: &str) -> Option<String> {
    AUTHORIZATION_URI
        .captures(challenge)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim_end_matches('/').to_string())
        .filter(|uri| !uri.is_empty())
}

/// Result of normalising a user-supplied location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedLocation {
    /// A valid location.
    Valid(String),
    /// The input was not a hostname label; [`DEFAULT_LOCATION`] is used.
    Defaulted {
        /// Normalised input that was rejected.
        requested: String,
    },
    /// Nothing left after normalisation.
    Blank,
}

impl NormalizedLocation {
    /// Location to connect to, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            NormalizedLocation::Valid(l) => Some(l),
            NormalizedLocation::Defaulted { .. } => Some(DEFAULT_LOCATION),
            NormalizedLocation::Blank => None,
        }
    }
}

/// Lowercase and strip whitespace; fall back to [`DEFAULT_LOCATION`] when the
/// result is not a valid hostname label.
pub fn normalize_location(raw: &str) -> NormalizedLocation {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    if normalized.is_empty() {
        NormalizedLocation::Blank
    } else if HOSTNAME_LABEL.is_match(&normalized) {
        NormalizedLocation::Valid(normalized)
    } else {
        NormalizedLocation::Defaulted {
            requested: normalized,
        }
    }
}
