//! Device-code login.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::oauth;
use super::{CachedCredential, TokenProvider};
use crate::error::{HalError, HalResult};
use crate::output::{LoginInstructions, LoginPrompt};

/// Device authorization response.
#[derive(Debug, Deserialize)]
struct DeviceAuthResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    #[serde(default = "default_interval")]
    interval: u64,
    #[serde(default)]
    message: Option<String>,
}

fn default_interval() -> u64 {
    5
}

/// Logs in by showing a code the user enters on another device.
pub struct DeviceCodeCredential {
    silent: CachedCredential,
    prompt: Arc<dyn LoginPrompt>,
}

impl DeviceCodeCredential {
    /// Create a device-code credential. Cached tokens in `silent` are reused
    /// before a new login is started.
    pub fn new(silent: CachedCredential, prompt: Arc<dyn LoginPrompt>) -> Self {
        Self {
            silent,
            prompt,
        }
    }

    /// Run the device-code flow.
    ///
    /// Blocks until the user completes the login, the code expires, or the
    /// authority rejects the request.
    #[instrument(skip(self))]
    pub async fn device_code_flow(&self) -> HalResult<super::CachedToken> {
        let endpoints = self.silent.endpoints();
        let scope = oauth::user_scopes(self.silent.scopes());
        let params = [("client_id", self.silent.client_id()), ("scope", scope.as_str())];

        let response = self
            .silent
            .http()
            .post(endpoints.device_code_endpoint())
            .form(&params)
            .send()
            .await
            .map_err(|e| HalError::Auth(format!("Device authorization request failed: {e}")))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(HalError::AuthenticationFailed(format!(
                "Device authorization failed: {error}"
            )));
        }

        let device_auth: DeviceAuthResponse = response
            .json()
            .await
            .map_err(|e| HalError::Auth(format!("Failed to parse device auth response: {e}")))?;

        let mut display = self.prompt.show_login_instructions(&LoginInstructions {
            url: device_auth.verification_uri.clone(),
            user_code: Some(device_auth.user_code.clone()),
            message: device_auth.message.clone(),
        });

        let timeout = Duration::from_secs(device_auth.expires_in);
        let mut interval = Duration::from_secs(device_auth.interval);
        let start = tokio::time::Instant::now();
        let token_endpoint = endpoints.token_endpoint();
        let poll_params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ("client_id", self.silent.client_id()),
            ("device_code", device_auth.device_code.as_str()),
        ];

        loop {
            if start.elapsed() > timeout {
                display.update("Device code login expired.");
                return Err(HalError::AuthenticationFailed(
                    "Device code authentication timed out".to_string(),
                ));
            }

            tokio::time::sleep(interval).await;

            match oauth::request_token(self.silent.http(), &token_endpoint, &poll_params).await {
                Ok(token) => {
                    info!("device code login succeeded");
                    display.update("Authenticated.");
                    return Ok(token);
                }
                Err(err) => match err.code() {
                    Some("authorization_pending") => {
                        debug!("authorization pending");
                    }
                    Some("slow_down") => {
                        interval += Duration::from_secs(5);
                    }
                    _ => {
                        let err = HalError::from(err);
                        display.update(&format!("Login failed: {err}"));
                        return Err(err);
                    }
                },
            }
        }
    }
}

#[async_trait]
impl TokenProvider for DeviceCodeCredential {
    async fn get_token(&self) -> HalResult<String> {
        if let Ok(token) = self.silent.get_token().await {
            return Ok(token);
        }
        let token = self.device_code_flow().await?;
        self.silent.save(&token);
        Ok(token.access_token)
    }

    fn has_valid_token(&self) -> bool {
        self.silent.has_valid_token()
    }
}
