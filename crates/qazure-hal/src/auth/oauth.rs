//! OAuth 2.0 endpoints and token grants against the Microsoft identity
//! platform (v2 endpoints).

use serde::Deserialize;

use super::CachedToken;
use crate::error::HalError;

/// Endpoints of one authority (e.g. `https://login.microsoftonline.com/organizations`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityEndpoints {
    authority: String,
}

impl AuthorityEndpoints {
    /// Endpoints for an authority URI.
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into().trim_end_matches('/').to_string(),
        }
    }

    /// Authority URI.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Same host, different tenant.
    pub fn for_tenant(&self, tenant: &str) -> Self {
        let host = match self.authority.find("://") {
            Some(scheme_end) => {
                let after = scheme_end + 3;
                match self.authority[after..].find('/') {
                    Some(slash) => &self.authority[..after + slash],
                    None => self.authority.as_str(),
                }
            }
            None => self.authority.as_str(),
        };
        Self::new(format!("{host}/{tenant}"))
    }

    /// Token endpoint.
    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }

    /// Device authorization endpoint.
    pub fn device_code_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/devicecode", self.authority)
    }

    /// Authorization endpoint.
    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.authority)
    }
}

/// `.default` scope of the resource a scope belongs to.
///
/// `https://quantum.microsoft.com/Jobs.ReadWrite` becomes
/// `https://quantum.microsoft.com/.default`.
pub fn default_scope(scope: &str) -> String {
    let resource = resource_of(scope);
    format!("{resource}/.default")
}

/// Resource URI of a scope (the scope without its last path segment).
pub(crate) fn resource_of(scope: &str) -> &str {
    let start = scope.find("://").map(|i| i + 3).unwrap_or(0);
    match scope[start..].rfind('/') {
        Some(i) => &scope[..start + i],
        None => scope,
    }
}

/// Scopes requested by user logins; includes `offline_access` so that a
/// refresh token is issued.
pub(crate) fn user_scopes(scopes: &[String]) -> String {
    let mut all: Vec<&str> = scopes.iter().map(String::as_str).collect();
    all.push("offline_access");
    all.join(" ")
}

pub(crate) fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Token response from the token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    pub(crate) fn into_cached(self) -> CachedToken {
        CachedToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at: now_secs() + self.expires_in,
            scope: self.scope,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// Failure of a token grant.
#[derive(Debug)]
pub(crate) enum GrantError {
    /// The authority rejected the grant with an OAuth error code.
    Rejected { error: String, description: String },
    /// Transport or decoding failure.
    Other(HalError),
}

impl GrantError {
    pub(crate) fn code(&self) -> Option<&str> {
        match self {
            GrantError::Rejected { error, .. } => Some(error),
            GrantError::Other(_) => None,
        }
    }
}

impl From<GrantError> for HalError {
    fn from(err: GrantError) -> Self {
        match err {
            GrantError::Rejected { error, description } => {
                HalError::AuthenticationFailed(format!("{error}: {description}"))
            }
            GrantError::Other(e) => e,
        }
    }
}

/// POST a form to a token endpoint and decode the token.
pub(crate) async fn request_token(
    client: &reqwest::Client,
    endpoint: &str,
    params: &[(&str, &str)],
) -> Result<CachedToken, GrantError> {
    let response = client
        .post(endpoint)
        .form(params)
        .send()
        .await
        .map_err(|e| GrantError::Other(HalError::Auth(format!("Token request failed: {e}"))))?;

    if response.status().is_success() {
        let token: TokenResponse = response.json().await.map_err(|e| {
            GrantError::Other(HalError::Auth(format!("Failed to parse token response: {e}")))
        })?;
        return Ok(token.into_cached());
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => Err(GrantError::Rejected {
            error: err.error,
            description: err.error_description,
        }),
        Err(_) => Err(GrantError::Other(HalError::Auth(format!(
            "Token request failed ({status}): {body}"
        )))),
    }
}

/// Exchange a refresh token for a new access token.
pub(crate) async fn refresh(
    client: &reqwest::Client,
    endpoints: &AuthorityEndpoints,
    client_id: &str,
    scopes: &[String],
    refresh_token: &str,
) -> Result<CachedToken, GrantError> {
    let scope = user_scopes(scopes);
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
        ("client_id", client_id),
        ("scope", scope.as_str()),
    ];
    let mut token = request_token(client, &endpoints.token_endpoint(), &params).await?;
    if token.refresh_token.is_none() {
        token.refresh_token = Some(refresh_token.to_string());
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let e = AuthorityEndpoints::new("https://login.microsoftonline.com/organizations/");
        assert_eq!(
            e.token_endpoint(),
            "https://login.microsoftonline.com/organizations/oauth2/v2.0/token"
        );
        assert_eq!(
            e.for_tenant("tenant-1").device_code_endpoint(),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/devicecode"
        );
        assert_eq!(
            AuthorityEndpoints::new("http://127.0.0.1:8080").for_tenant("t").authority(),
            "http://127.0.0.1:8080/t"
        );
    }

    #[test]
    fn test_default_scope() {
        assert_eq!(
            default_scope("https://quantum.microsoft.com/Jobs.ReadWrite"),
            "https://quantum.microsoft.com/.default"
        );
        assert_eq!(
            default_scope("api://dogfood.azure-quantum/Jobs.ReadWrite"),
            "api://dogfood.azure-quantum/.default"
        );
        assert_eq!(resource_of("https://quantum.microsoft.com"), "https://quantum.microsoft.com");
    }

    #[test]
    fn test_user_scopes_request_refresh_token() {
        let scopes = vec!["https://quantum.microsoft.com/Jobs.ReadWrite".to_string()];
        assert_eq!(
            user_scopes(&scopes),
            "https://quantum.microsoft.com/Jobs.ReadWrite offline_access"
        );
    }
}
