//! Managed identity of the host (IMDS or App Service identity endpoint).

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::oauth::{self, resource_of};
use super::{CachedToken, REFRESH_BUFFER_SECS, TokenProvider};
use crate::error::{HalError, HalResult};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IDENTITY_ENDPOINT_VAR: &str = "IDENTITY_ENDPOINT";
const IDENTITY_HEADER_VAR: &str = "IDENTITY_HEADER";
const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Imds { endpoint: String },
    AppService { endpoint: String, header: String },
}

#[derive(Debug, Deserialize)]
struct IdentityToken {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    /// Unix timestamp; IMDS sends it as a string.
    expires_on: serde_json::Value,
}

/// Token from the managed identity endpoint.
pub struct ManagedIdentityCredential {
    client: reqwest::Client,
    source: Source,
    resource: String,
    client_id: Option<String>,
    token: RwLock<Option<CachedToken>>,
}

impl ManagedIdentityCredential {
    /// App Service identity when `IDENTITY_ENDPOINT`/`IDENTITY_HEADER` are
    /// set, IMDS otherwise. `AZURE_CLIENT_ID` selects a user-assigned
    /// identity.
    pub fn from_env(client: reqwest::Client, scopes: &[String]) -> Self {
        let source = match (
            std::env::var(IDENTITY_ENDPOINT_VAR).ok(),
            std::env::var(IDENTITY_HEADER_VAR).ok(),
        ) {
            (Some(endpoint), Some(header)) => Source::AppService { endpoint, header },
            _ => Source::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        };
        Self::with_source(client, source, scopes, std::env::var(CLIENT_ID_VAR).ok())
    }

    /// Query an IMDS-compatible endpoint.
    pub fn imds(client: reqwest::Client, endpoint: impl Into<String>, scopes: &[String]) -> Self {
        Self::with_source(
            client,
            Source::Imds {
                endpoint: endpoint.into(),
            },
            scopes,
            None,
        )
    }

    fn with_source(
        client: reqwest::Client,
        source: Source,
        scopes: &[String],
        client_id: Option<String>,
    ) -> Self {
        let resource = scopes
            .first()
            .map(|s| resource_of(s).to_string())
            .unwrap_or_default();
        Self {
            client,
            source,
            resource,
            client_id,
            token: RwLock::new(None),
        }
    }

    #[instrument(skip(self))]
    async fn request(&self) -> HalResult<CachedToken> {
        let mut query = vec![("resource", self.resource.as_str())];
        if let Some(ref id) = self.client_id {
            query.push(("client_id", id.as_str()));
        }

        let request = match &self.source {
            Source::Imds { endpoint } => {
                query.push(("api-version", "2018-02-01"));
                self.client.get(endpoint).header("Metadata", "true")
            }
            Source::AppService { endpoint, header } => {
                query.push(("api-version", "2019-08-01"));
                self.client.get(endpoint).header("X-IDENTITY-HEADER", header)
            }
        };

        let response = request
            .query(&query)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| {
                HalError::CredentialUnavailable(format!("Managed identity endpoint unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "managed identity request rejected");
            return Err(HalError::AuthenticationFailed(format!(
                "Managed identity token request failed ({status}): {body}"
            )));
        }

        let token: IdentityToken = response.json().await.map_err(|e| {
            HalError::Auth(format!("Failed to parse managed identity token: {e}"))
        })?;
        let expires_at = match &token.expires_on {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or_else(|| oauth::now_secs() + 300);

        Ok(CachedToken {
            access_token: token.access_token,
            refresh_token: None,
            token_type: token.token_type.unwrap_or_else(|| "Bearer".into()),
            expires_at,
            scope: None,
        })
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityCredential {
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_imds_token() {
        let server = MockServer::start().await;
        let expires_on = (oauth::now_secs() + 3600).to_string();
        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(header("Metadata", "true"))
            .and(query_param("resource", "https://quantum.microsoft.com"))
            .and(query_param("api-version", "2018-02-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mi-token",
                "expires_on": expires_on,
                "resource": "https://quantum.microsoft.com",
                "token_type": "Bearer",
            })))
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::imds(
            reqwest::Client::new(),
            format!("{}/metadata/identity/oauth2/token", server.uri()),
            &["https://quantum.microsoft.com/Jobs.ReadWrite".to_string()],
        );
        assert_eq!(credential.get_token().await.unwrap(), "mi-token");
        assert!(credential.has_valid_token());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_unavailable() {
        let credential = ManagedIdentityCredential::imds(
            reqwest::Client::new(),
            "http://127.0.0.1:9/metadata/identity/oauth2/token",
            &["https://quantum.microsoft.com/Jobs.ReadWrite".to_string()],
        );
        let err = credential.get_token().await.unwrap_err();
        assert!(matches!(err, HalError::CredentialUnavailable(_)));
    }
}
