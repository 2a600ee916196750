//! Workspace implementation over the REST client.
//!
//! Every method logs service failures at `warn` and returns `None` (or
//! [`JobLookup::Unavailable`]); no transport error crosses this boundary.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use qazure_hal::{
    AzureEnvironment, AzureJob, JobLookup, JobOutput, JobSubmission, ProviderStatus,
    QuantumMachine, Quota, TokenProvider, Workspace, WorkspaceFactory, WorkspaceParams,
};

use crate::api::{JobDetails, QuantumApiClient};
use crate::error::{AzureApiError, AzureApiResult};
use crate::storage::{self, ConnectionString};

/// Blob name of the uploaded program.
pub const INPUT_BLOB: &str = "inputData";

/// How job containers get their SAS URI.
#[derive(Debug, Clone)]
enum StorageSource {
    /// Workspace-linked storage via `storage/sasUri`.
    Linked,
    /// User-supplied connection string with a shared access signature.
    ConnectionString(ConnectionString),
}

/// A workspace reached through the Azure Quantum REST API.
pub struct AzureWorkspace {
    params: WorkspaceParams,
    api: Arc<QuantumApiClient>,
    storage: StorageSource,
}

impl AzureWorkspace {
    /// Create a workspace handle for a base URL (see
    /// [`AzureEnvironment::base_uri`]).
    pub fn new(
        base_url: &str,
        params: WorkspaceParams,
        credential: Arc<dyn TokenProvider>,
    ) -> AzureApiResult<Self> {
        let api = QuantumApiClient::new(base_url, &params, credential)?;
        let storage = match params.storage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => StorageSource::Linked,
            Some(raw) => {
                let cs = ConnectionString::parse(raw)?;
                if cs.is_account_key() {
                    warn!(
                        "Storage connection strings with an account key are not supported; using the workspace's linked storage"
                    );
                    StorageSource::Linked
                } else {
                    StorageSource::ConnectionString(cs)
                }
            }
        };
        Ok(Self {
            params,
            api: Arc::new(api),
            storage,
        })
    }
}

#[async_trait]
impl Workspace for AzureWorkspace {
    fn params(&self) -> &WorkspaceParams {
        &self.params
    }

    #[instrument(skip(self), fields(workspace = %self.params.name))]
    async fn providers(&self) -> Option<Vec<ProviderStatus>> {
        match self.api.provider_status().await {
            Ok(providers) => Some(providers),
            Err(e) => {
                warn!(error = %e, "Failed to list providers");
                None
            }
        }
    }

    #[instrument(skip(self), fields(workspace = %self.params.name))]
    async fn get_job(&self, job_id: &str) -> JobLookup {
        match self.api.get_job(job_id).await {
            Ok(job) => JobLookup::Found(job),
            Err(AzureApiError::NotFound(_)) => JobLookup::NotFound,
            Err(e) => {
                warn!(error = %e, "Failed to get job");
                JobLookup::Unavailable
            }
        }
    }

    #[instrument(skip(self), fields(workspace = %self.params.name))]
    async fn jobs(&self) -> Option<Vec<AzureJob>> {
        match self.api.list_jobs().await {
            Ok(jobs) => Some(jobs),
            Err(e) => {
                warn!(error = %e, "Failed to list jobs");
                None
            }
        }
    }

    #[instrument(skip(self), fields(workspace = %self.params.name))]
    async fn quotas(&self) -> Option<Vec<Quota>> {
        match self.api.list_quotas().await {
            Ok(quotas) => Some(quotas),
            Err(e) => {
                warn!(error = %e, "Failed to list quotas");
                None
            }
        }
    }

    fn create_machine(&self, target_id: &str) -> Option<Arc<dyn QuantumMachine>> {
        let provider = target_id.split('.').next().filter(|p| !p.is_empty())?;
        Some(Arc::new(AzureMachine {
            target_id: target_id.to_string(),
            provider_id: provider.to_ascii_lowercase(),
            api: Arc::clone(&self.api),
            storage: self.storage.clone(),
        }))
    }

    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn job_output(&self, job: &AzureJob) -> Option<JobOutput> {
        let Some(uri) = job.output_data_uri.as_deref() else {
            warn!("Job has no output data URI");
            return None;
        };
        let data = match storage::download_blob(self.api.http(), uri).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "Failed to download job output");
                return None;
            }
        };
        let value: serde_json::Value = match serde_json::from_slice(&data) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Job output is not JSON");
                return None;
            }
        };
        match JobOutput::decode(job.id.clone(), job.output_data_format.clone(), value) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(error = %e, "Failed to decode job output");
                None
            }
        }
    }
}

/// Submits jobs to one target of a workspace.
pub struct AzureMachine {
    target_id: String,
    provider_id: String,
    api: Arc<QuantumApiClient>,
    storage: StorageSource,
}

impl AzureMachine {
    async fn container_uri(&self, container: &str) -> AzureApiResult<String> {
        match &self.storage {
            StorageSource::Linked => self.api.sas_uri(container, None).await,
            StorageSource::ConnectionString(cs) => cs.container_sas_uri(container).ok_or_else(|| {
                AzureApiError::InvalidConnectionString("no shared access signature".into())
            }),
        }
    }

    async fn try_submit(&self, submission: &JobSubmission) -> AzureApiResult<AzureJob> {
        let container = format!("job-{}", submission.id);
        let container_uri = self.container_uri(&container).await?;
        storage::create_container(self.api.http(), &container_uri).await?;

        let input_uri = storage::blob_uri(&container_uri, INPUT_BLOB);
        storage::upload_blob(
            self.api.http(),
            &input_uri,
            &format!("application/x-{}", submission.input_data_format),
            submission.input_data.clone(),
        )
        .await?;
        debug!(container = %container, "uploaded job input");

        let details = JobDetails {
            id: submission.id.clone(),
            name: submission.name.clone(),
            provider_id: self.provider_id.clone(),
            target: self.target_id.clone(),
            container_uri,
            input_data_uri: input_uri,
            input_data_format: submission.input_data_format.clone(),
            input_params: submission.input_params.clone(),
            output_data_format: submission.output_data_format.clone(),
        };
        self.api.create_job(&details).await
    }
}

#[async_trait]
impl QuantumMachine for AzureMachine {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    #[instrument(skip(self, submission), fields(target = %self.target_id, job_id = %submission.id))]
    async fn submit(&self, submission: &JobSubmission) -> Option<AzureJob> {
        match self.try_submit(submission).await {
            Ok(job) => {
                info!(status = %job.status, "job created");
                Some(job)
            }
            Err(e) => {
                warn!(error = %e, "Failed to submit job");
                None
            }
        }
    }
}

/// Opens [`AzureWorkspace`]s at the environment's base URI.
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureWorkspaceFactory;

#[async_trait]
impl WorkspaceFactory for AzureWorkspaceFactory {
    async fn open(
        &self,
        params: &WorkspaceParams,
        environment: &AzureEnvironment,
        credential: Arc<dyn TokenProvider>,
    ) -> Option<Arc<dyn Workspace>> {
        let base_url = environment.base_uri(&params.location);
        match AzureWorkspace::new(&base_url, params.clone(), credential) {
            Ok(workspace) => Some(Arc::new(workspace)),
            Err(e) => {
                warn!(error = %e, "Failed to create workspace client");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qazure_hal::StaticTokenProvider;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WS: &str = "/v1.0/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Quantum/workspaces/ws";

    fn params(storage: Option<String>) -> WorkspaceParams {
        WorkspaceParams {
            subscription_id: "sub".into(),
            resource_group: "rg".into(),
            name: "ws".into(),
            location: "westus".into(),
            storage,
        }
    }

    fn workspace(server: &MockServer, storage: Option<String>) -> AzureWorkspace {
        AzureWorkspace::new(&server.uri(), params(storage), Arc::new(StaticTokenProvider::new("tok")))
            .unwrap()
    }

    fn submission() -> JobSubmission {
        let mut input_params = serde_json::Map::new();
        input_params.insert("entryPoint".into(), "ENTRYPOINT__Hello".into());
        input_params.insert("shots".into(), 100.into());
        JobSubmission {
            id: "abc".into(),
            name: "hello".into(),
            target: "ionq.simulator".into(),
            provider: "ionq".into(),
            input_data_format: "qir.v1".into(),
            output_data_format: "microsoft.quantum-results.v1".into(),
            input_data: b"BC\xc0\xde".to_vec(),
            input_params,
        }
    }

    #[tokio::test]
    async fn test_get_job_distinguishes_not_found_from_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{WS}/jobs/gone")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{WS}/jobs/broken")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{WS}/jobs/ok")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "ok", "status": "Succeeded"})),
            )
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        assert_eq!(ws.get_job("gone").await, JobLookup::NotFound);
        assert_eq!(ws.get_job("broken").await, JobLookup::Unavailable);
        assert!(matches!(ws.get_job("ok").await, JobLookup::Found(j) if j.id == "ok"));
    }

    #[tokio::test]
    async fn test_transport_failures_surface_as_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        assert!(ws.providers().await.is_none());
        assert!(ws.jobs().await.is_none());
        assert!(ws.quotas().await.is_none());
        assert!(ws.list_jobs(None, None).await.is_none());
    }

    #[tokio::test]
    async fn test_list_jobs_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{WS}/jobs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [
                    {"id": "JOB_ID_1", "name": "a", "target": "ionq.qpu"},
                    {"id": "JOB_ID_2", "name": "b", "target": "ionq.simulator"},
                ]
            })))
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        assert_eq!(ws.list_jobs(Some("job_id_1"), None).await.unwrap().len(), 1);
        assert_eq!(ws.list_jobs(None, None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_submit_via_linked_storage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{WS}/storage/sasUri")))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"sasUri": format!("{}/blob/job-abc?sig=1", server.uri())}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/blob/job-abc"))
            .and(query_param("restype", "container"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/blob/job-abc/inputData"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{WS}/jobs/abc")))
            .and(body_partial_json(serde_json::json!({
                "providerId": "ionq",
                "target": "ionq.simulator",
                "inputDataFormat": "qir.v1",
                "inputParams": {"entryPoint": "ENTRYPOINT__Hello", "shots": 100},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "abc", "name": "hello", "status": "Waiting",
                "providerId": "ionq", "target": "ionq.simulator",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        let machine = ws.create_machine("ionq.simulator").unwrap();
        let job = machine.submit(&submission()).await.unwrap();
        assert_eq!(job.id, "abc");
        assert_eq!(job.status, "Waiting");
    }

    #[tokio::test]
    async fn test_submit_via_sas_connection_string() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/job-abc"))
            .and(query_param("sig", "2"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/job-abc/inputData"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("{WS}/jobs/abc")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "abc", "status": "Waiting"})),
            )
            .mount(&server)
            .await;

        let cs = format!("BlobEndpoint={};SharedAccessSignature=sig=2", server.uri());
        let ws = workspace(&server, Some(cs));
        let job = ws.create_machine("ionq.simulator").unwrap().submit(&submission()).await;
        assert_eq!(job.map(|j| j.id).as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_submit_failure_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        let machine = ws.create_machine("ionq.simulator").unwrap();
        assert!(machine.submit(&submission()).await.is_none());
    }

    #[tokio::test]
    async fn test_job_output_histogram() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob/job-abc/outputData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "DataFormat": "microsoft.quantum-results.v1",
                "Histogram": ["[0]", 0.5, "[1]", 0.5],
            })))
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        let job: AzureJob = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "status": "Succeeded",
            "outputDataUri": format!("{}/blob/job-abc/outputData?sig=1", server.uri()),
            "outputDataFormat": "microsoft.quantum-results.v1",
        }))
        .unwrap();
        let output = ws.job_output(&job).await.unwrap();
        assert_eq!(output.histogram.unwrap().get("[1]"), Some(0.5));

        let no_uri: AzureJob = serde_json::from_value(serde_json::json!({"id": "x"})).unwrap();
        assert!(ws.job_output(&no_uri).await.is_none());
    }

    #[tokio::test]
    async fn test_job_output_resource_estimate() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob/job-est/outputData"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "physicalCounts": {"physicalQubits": 102094, "runtime": 4574000},
                "status": "success",
            })))
            .mount(&server)
            .await;

        let ws = workspace(&server, None);
        let job: AzureJob = serde_json::from_value(serde_json::json!({
            "id": "est",
            "status": "Succeeded",
            "target": "microsoft.estimator",
            "outputDataUri": format!("{}/blob/job-est/outputData?sig=1", server.uri()),
            "outputDataFormat": "microsoft.resource-estimates.v1",
        }))
        .unwrap();
        let output = ws.job_output(&job).await.unwrap();
        assert!(output.histogram.is_none());
        assert_eq!(output.format.as_deref(), Some("microsoft.resource-estimates.v1"));
        assert_eq!(output.raw["physicalCounts"]["physicalQubits"], 102094);
    }

    #[test]
    fn test_invalid_connection_string_rejected() {
        let result = AzureWorkspace::new(
            "https://westus.quantum.azure.com/",
            params(Some("nonsense".into())),
            Arc::new(StaticTokenProvider::new("tok")),
        );
        assert!(result.is_err());
    }
}
