//! Azure Quantum data-plane REST client.
//!
//! Implements the workspace-scoped REST API
//! (`https://{location}.quantum.azure.com/v1.0/subscriptions/.../workspaces/{name}/`)
//! for provider status, jobs, quotas, and storage SAS URIs.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use qazure_hal::{AzureJob, ProviderStatus, Quota, TokenProvider, WorkspaceParams};

use crate::error::{AzureApiError, AzureApiResult};

/// API version segment of the data-plane paths.
pub const API_VERSION: &str = "v1.0";

/// Azure Quantum REST API client for one workspace.
pub struct QuantumApiClient {
    /// HTTP client with timeouts configured.
    client: Client,
    /// Workspace root URL (without trailing slash).
    workspace_url: String,
    /// Access token source.
    credential: Arc<dyn TokenProvider>,
}

impl std::fmt::Debug for QuantumApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantumApiClient")
            .field("workspace_url", &self.workspace_url)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

impl QuantumApiClient {
    /// Create a client for a workspace behind `base_url`
    /// (e.g. `https://westus.quantum.azure.com/`).
    pub fn new(
        base_url: &str,
        params: &WorkspaceParams,
        credential: Arc<dyn TokenProvider>,
    ) -> AzureApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let workspace_url = format!(
            "{}/{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Quantum/workspaces/{}",
            base_url.trim_end_matches('/'),
            API_VERSION,
            params.subscription_id,
            params.resource_group,
            params.name
        );

        Ok(Self {
            client,
            workspace_url,
            credential,
        })
    }

    /// Shared HTTP client, reused for blob storage.
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Workspace root URL.
    pub fn workspace_url(&self) -> &str {
        &self.workspace_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.workspace_url, path.trim_start_matches('/'))
    }

    async fn bearer(&self) -> AzureApiResult<String> {
        let token = self.credential.get_token().await?;
        Ok(format!("Bearer {token}"))
    }

    async fn get_url<T: DeserializeOwned>(&self, url: &str) -> AzureApiResult<T> {
        let resp = self
            .client
            .get(url)
            .header("Authorization", self.bearer().await?)
            .send()
            .await?;
        handle_response(resp).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &impl Serialize,
    ) -> AzureApiResult<T> {
        let resp = self
            .client
            .request(method, self.url(path))
            .header("Authorization", self.bearer().await?)
            .json(body)
            .send()
            .await?;
        handle_response(resp).await
    }

    /// GET every page of a `{"value": [...], "nextLink": ...}` listing.
    async fn get_paged<T: DeserializeOwned>(&self, path: &str) -> AzureApiResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(self.url(path));
        while let Some(url) = next {
            let page: Page<T> = self.get_url(&url).await?;
            items.extend(page.value);
            next = page.next_link.filter(|l| !l.is_empty());
        }
        Ok(items)
    }

    // -----------------------------------------------------------------------
    // Public API methods
    // -----------------------------------------------------------------------

    /// Providers of the workspace and the status of their targets.
    #[instrument(skip(self))]
    pub async fn provider_status(&self) -> AzureApiResult<Vec<ProviderStatus>> {
        debug!("Listing provider status");
        self.get_paged("providerStatus").await
    }

    /// Get a single job.
    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str) -> AzureApiResult<AzureJob> {
        debug!("Getting job {}", job_id);
        self.get_url(&self.url(&format!("jobs/{job_id}"))).await
    }

    /// List all jobs of the workspace.
    #[instrument(skip(self))]
    pub async fn list_jobs(&self) -> AzureApiResult<Vec<AzureJob>> {
        debug!("Listing jobs");
        self.get_paged("jobs").await
    }

    /// Create a job.
    #[instrument(skip(self, details), fields(target = %details.target))]
    pub async fn create_job(&self, details: &JobDetails) -> AzureApiResult<AzureJob> {
        debug!("Creating job {}", details.id);
        self.send_json(reqwest::Method::PUT, &format!("jobs/{}", details.id), details)
            .await
    }

    /// List quotas.
    #[instrument(skip(self))]
    pub async fn list_quotas(&self) -> AzureApiResult<Vec<Quota>> {
        debug!("Listing quotas");
        self.get_paged("quotas").await
    }

    /// SAS URI for a container (and optionally one blob) in the workspace's
    /// linked storage account.
    #[instrument(skip(self))]
    pub async fn sas_uri(&self, container: &str, blob: Option<&str>) -> AzureApiResult<String> {
        let request = SasUriRequest {
            container_name: container.to_string(),
            blob_name: blob.map(String::from),
        };
        let response: SasUriResponse = self
            .send_json(reqwest::Method::POST, "storage/sasUri", &request)
            .await?;
        Ok(response.sas_uri)
    }
}

/// Deserialize a success body or map the status to an error.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> AzureApiResult<T> {
    let status = response.status();

    if status.is_success() {
        let body = response.json().await?;
        Ok(body)
    } else {
        let message = error_message(response.text().await.unwrap_or_default());
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AzureApiError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => Err(AzureApiError::NotFound(message)),
            _ => Err(AzureApiError::ApiError {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

/// Prefer `error.message` of a service error body over the raw text.
fn error_message(body: String) -> String {
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .map(|b| format!("{}: {}", b.error.code, b.error.message))
        .unwrap_or(body)
}

// ---------------------------------------------------------------------------
// Request / response serde types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SasUriRequest {
    container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    blob_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SasUriResponse {
    sas_uri: String,
}

/// Request body for `PUT jobs/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    /// Job id.
    pub id: String,
    /// Friendly name.
    pub name: String,
    /// Provider id.
    pub provider_id: String,
    /// Target id.
    pub target: String,
    /// SAS URI of the job container.
    pub container_uri: String,
    /// SAS URI of the uploaded input blob.
    pub input_data_uri: String,
    /// Input format (e.g. `"qir.v1"`).
    pub input_data_format: String,
    /// Input parameters.
    pub input_params: serde_json::Map<String, serde_json::Value>,
    /// Expected output format.
    pub output_data_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use qazure_hal::StaticTokenProvider;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WS: &str = "/v1.0/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Quantum/workspaces/ws";

    fn params() -> WorkspaceParams {
        WorkspaceParams {
            subscription_id: "sub".into(),
            resource_group: "rg".into(),
            name: "ws".into(),
            location: "westus".into(),
            storage: None,
        }
    }

    fn client(server: &MockServer) -> QuantumApiClient {
        QuantumApiClient::new(&server.uri(), &params(), Arc::new(StaticTokenProvider::new("tok"))).unwrap()
    }

    #[tokio::test]
    async fn test_provider_status_follows_next_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{WS}/providerStatus")))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "ionq", "currentAvailability": "Available",
                           "targets": [{"id": "ionq.simulator", "currentAvailability": "Available", "averageQueueTime": 3}]}],
                "nextLink": format!("{}/page2", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{"id": "quantinuum", "currentAvailability": "Degraded", "targets": []}],
            })))
            .mount(&server)
            .await;

        let providers = client(&server).provider_status().await.unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].targets[0].id, "ionq.simulator");
        assert_eq!(providers[1].current_availability, "Degraded");
    }

    #[tokio::test]
    async fn test_get_job_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{WS}/jobs/missing")))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "error": {"code": "JobNotFound", "message": "Job missing was not found"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).get_job("missing").await.unwrap_err();
        assert!(matches!(err, AzureApiError::NotFound(ref m) if m.contains("JobNotFound")));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = client(&server).list_quotas().await.unwrap_err();
        assert!(matches!(err, AzureApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sas_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{WS}/storage/sasUri")))
            .and(wiremock::matchers::body_json(serde_json::json!({"containerName": "job-1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"sasUri": "https://acct.blob/job-1?sig=x"})),
            )
            .mount(&server)
            .await;

        let uri = client(&server).sas_uri("job-1", None).await.unwrap();
        assert_eq!(uri, "https://acct.blob/job-1?sig=x");
    }
}
