//! Tokens from the Azure CLI's cached login.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::Deserialize;
use tracing::instrument;

use super::{CachedToken, REFRESH_BUFFER_SECS, TokenProvider};
use crate::error::{HalError, HalResult};

#[cfg(windows)]
const AZ_PROGRAM: &str = "az.cmd";
#[cfg(not(windows))]
const AZ_PROGRAM: &str = "az";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    /// Local time, `"%Y-%m-%d %H:%M:%S%.f"`.
    #[serde(default)]
    expires_on: Option<String>,
    /// Unix timestamp; newer CLI versions only.
    #[serde(default, rename = "expires_on")]
    expires_on_unix: Option<u64>,
}

/// Asks `az account get-access-token` for a token.
pub struct AzureCliCredential {
    program: String,
    scope: String,
    token: RwLock<Option<CachedToken>>,
}

impl AzureCliCredential {
    /// Create a CLI credential for the first of `scopes`.
    pub fn new(scopes: &[String]) -> Self {
        Self {
            program: AZ_PROGRAM.to_string(),
            scope: scopes.first().cloned().unwrap_or_default(),
            token: RwLock::new(None),
        }
    }

    /// Use a different executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    #[instrument(skip(self))]
    async fn request(&self) -> HalResult<CachedToken> {
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--output", "json", "--scope"])
            .arg(&self.scope)
            .output()
            .await
            .map_err(|e| {
                HalError::CredentialUnavailable(format!("Azure CLI not available ({}): {e}", self.program))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim();
            if message.contains("az login") {
                return Err(HalError::CredentialUnavailable(format!(
                    "Azure CLI is not logged in: {message}"
                )));
            }
            return Err(HalError::AuthenticationFailed(format!(
                "Azure CLI failed to get a token: {message}"
            )));
        }

        parse_cli_token(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_cli_token(stdout: &str) -> HalResult<CachedToken> {
    let token: CliToken = serde_json::from_str(stdout)?;
    let expires_at = match (token.expires_on_unix, token.expires_on.as_deref()) {
        (Some(unix), _) => unix,
        (None, Some(local)) => parse_local_time(local)?,
        (None, None) => {
            return Err(HalError::Auth(
                "Azure CLI token has no expiry".to_string(),
            ));
        }
    };
    Ok(CachedToken {
        access_token: token.access_token,
        refresh_token: None,
        token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
        expires_at,
        scope: None,
    })
}

fn parse_local_time(value: &str) -> HalResult<u64> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| HalError::Auth(format!("Invalid Azure CLI expiry {value:?}: {e}")))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| HalError::Auth(format!("Ambiguous Azure CLI expiry {value:?}")))?;
    Ok(local.timestamp().max(0) as u64)
}

#[async_trait]
impl TokenProvider for AzureCliCredential {
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
