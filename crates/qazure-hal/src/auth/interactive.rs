//! Browser login with a loopback redirect.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};

use super::oauth::{self, AuthorityEndpoints};
use super::{CachedCredential, CachedToken, TokenProvider};
use crate::error::{HalError, HalResult};
use crate::output::{LoginInstructions, LoginPrompt};

const SUCCESS_PAGE: &str = "<html><body><h3>Authentication complete.</h3>You can close this window.</body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>Return to your notebook for details.</body></html>";

/// Opens the system browser on the authorize endpoint and receives the
/// authorization code on a `http://localhost:<port>` redirect.
pub struct InteractiveCredential {
    silent: CachedCredential,
    prompt: Arc<dyn LoginPrompt>,
    timeout: Duration,
}

impl InteractiveCredential {
    /// Create an interactive credential. Cached tokens in `silent` are reused
    /// before the browser is opened.
    pub fn new(silent: CachedCredential, prompt: Arc<dyn LoginPrompt>) -> Self {
        Self {
            silent,
            prompt,
            timeout: Duration::from_secs(300),
        }
    }

    /// How long to wait for the browser redirect.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the authorization-code flow.
    #[instrument(skip(self))]
    pub async fn browser_flow(&self) -> HalResult<CachedToken> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://localhost:{port}");
        let state = uuid::Uuid::new_v4().to_string();
        let scope = oauth::user_scopes(self.silent.scopes());
        let url = authorize_url(
            self.silent.endpoints(),
            self.silent.client_id(),
            &redirect_uri,
            &scope,
            &state,
        )?;

        let mut display = self.prompt.show_login_instructions(&LoginInstructions {
            url: url.clone(),
            user_code: None,
            message: None,
        });
        if let Err(e) = webbrowser::open(&url) {
            warn!(error = %e, "Failed to open a browser; open the login URL manually");
        }

        let code = match tokio::time::timeout(self.timeout, accept_redirect(&listener, &state)).await {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                display.update(&format!("Login failed: {e}"));
                return Err(e);
            }
            Err(_) => {
                display.update("Browser login timed out.");
                return Err(HalError::AuthenticationFailed(
                    "Timed out waiting for the browser login".into(),
                ));
            }
        };

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.silent.client_id()),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];
        let token = oauth::request_token(
            self.silent.http(),
            &self.silent.endpoints().token_endpoint(),
            &params,
        )
        .await
        .map_err(HalError::from)?;

        info!("browser login succeeded");
        display.update("Authenticated.");
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for InteractiveCredential {
    async fn get_token(&self) -> HalResult<String> {
        if let Ok(token) = self.silent.get_token().await {
            return Ok(token);
        }
        let token = self.browser_flow().await?;
        self.silent.save(&token);
        Ok(token.access_token)
    }

    fn has_valid_token(&self) -> bool {
        self.silent.has_valid_token()
    }
}

fn authorize_url(
    endpoints: &AuthorityEndpoints,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> HalResult<String> {
    let url = reqwest::Url::parse_with_params(
        &endpoints.authorize_endpoint(),
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("response_mode", "query"),
            ("scope", scope),
            ("state", state),
            ("prompt", "select_account"),
        ],
    )
    .map_err(|e| HalError::Configuration(format!("Invalid authority URL: {e}")))?;
    Ok(url.to_string())
}

/// Serve redirects until one carries the authorization response.
async fn accept_redirect(listener: &TcpListener, expected_state: &str) -> HalResult<String> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let mut buf = vec![0u8; 8192];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);
        let request_line = request.lines().next().unwrap_or_default();
        debug!(%peer, "redirect received");

        let (status, page, outcome) = match parse_redirect(request_line, expected_state) {
            Ok(Some(code)) => ("200 OK", SUCCESS_PAGE, Some(Ok(code))),
            Ok(None) => ("404 Not Found", "", None),
            Err(e) => ("400 Bad Request", FAILURE_PAGE, Some(Err(e))),
        };
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
            page.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;

        if let Some(outcome) = outcome {
            return outcome;
        }
    }
}

/// Extract the authorization code from a redirect request line.
///
/// Returns `Ok(None)` for requests that are not the authorization response
/// (e.g. `/favicon.ico`).
fn parse_redirect(request_line: &str, expected_state: &str) -> HalResult<Option<String>> {
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let url = reqwest::Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| HalError::Auth(format!("Malformed redirect: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = String::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = value.into_owned(),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(HalError::AuthenticationFailed(format!("{error}: {description}")));
    }
    let Some(code) = code else {
        return Ok(None);
    };
    if state.as_deref() != Some(expected_state) {
        return Err(HalError::AuthenticationFailed(
            "Login response state does not match the request".into(),
        ));
    }
    Ok(Some(code))
}
