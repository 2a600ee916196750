//! Client behaviour against the mock environment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use qazure_adapter_mock::{MOCK_PROVIDERS_WORKSPACE, MockBehavior, MockWorkspaceFactory};
use qazure_client::{
    AzureClient, AzureClientError, ClientEvent, ConnectionParams, InMemoryPackageLoader,
    ProgramCatalog, SubmissionContext, SubmissionDefaults,
};
use qazure_hal::{AuthorityCache, BufferedChannel, CredentialType, JobStatus, TargetCapability};

const SUBSCRIPTION: &str = "f846b2bd-d0e2-4a1d-8141-4c6944a9d387";
const RESOURCE_GROUP: &str = "test";

const CATALOG: &str = r#"
operations:
  - name: Microsoft.Quantum.SanityTests.HelloQ
    capability: BasicQuantumFunctionality
    qir: "define void @ENTRYPOINT__HelloQ() { ret void }"
  - name: Microsoft.Quantum.SanityTests.HelloAgain
    capability: FullComputation
    parameters:
      - name: count
        type: Int
      - name: name
        type: String
    qir: "define void @ENTRYPOINT__HelloAgain() { ret void }"
"#;

struct Harness {
    client: AzureClient,
    output: BufferedChannel,
    factory: Arc<MockWorkspaceFactory>,
}

impl Harness {
    fn new(behavior: MockBehavior) -> Self {
        Self::with_loader(behavior, InMemoryPackageLoader::new())
    }

    fn with_loader(behavior: MockBehavior, loader: InMemoryPackageLoader) -> Self {
        let output = BufferedChannel::new();
        let factory = Arc::new(MockWorkspaceFactory::with_behavior(behavior));
        let catalog = ProgramCatalog::from_yaml_str(CATALOG).unwrap();
        let client = AzureClient::builder()
            .output(output.clone())
            .environment("mock")
            .env_lookup(Arc::new(|_: &str| None))
            .mock_factory(factory.clone())
            .entry_points(Arc::new(catalog))
            .package_loader(Arc::new(loader))
            .build()
            .unwrap();
        Self {
            client,
            output,
            factory,
        }
    }

    async fn connected(behavior: MockBehavior) -> Self {
        let mut harness = Self::new(behavior);
        harness.client.connect(mock_params(), None).await.unwrap();
        harness
    }

    async fn with_target(behavior: MockBehavior, target: &str) -> Self {
        let mut harness = Self::connected(behavior).await;
        harness.client.set_active_target(target, None).await.unwrap();
        harness
    }

    fn job_count(&self) -> usize {
        self.factory
            .workspace(MOCK_PROVIDERS_WORKSPACE)
            .map(|ws| ws.job_count())
            .unwrap_or(0)
    }
}

fn mock_params() -> ConnectionParams {
    ConnectionParams::new(SUBSCRIPTION, RESOURCE_GROUP, MOCK_PROVIDERS_WORKSPACE).with_location("westus")
}

fn context(input: &str) -> SubmissionContext {
    SubmissionContext::parse(input, SubmissionDefaults::default()).unwrap()
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_operations_before_connect_fail() {
    let mut h = Harness::new(MockBehavior::default());

    assert_eq!(h.client.connection_status().unwrap_err(), AzureClientError::NotConnected);
    assert_eq!(
        h.client.set_active_target("ionq.mock", None).await.unwrap_err(),
        AzureClientError::NotConnected
    );
    assert_eq!(
        h.client.submit_job(&context("HelloQ"), None).await.unwrap_err(),
        AzureClientError::NotConnected
    );
    assert_eq!(
        h.client.job_status(Some("job"), None).await.unwrap_err(),
        AzureClientError::NotConnected
    );
    assert_eq!(
        h.client.job_list(None, None, None).await.unwrap_err(),
        AzureClientError::NotConnected
    );
    assert_eq!(h.client.quota_list(None).await.unwrap_err(), AzureClientError::NotConnected);
    assert!(h.output.contains("Not connected to any Azure Quantum workspace."));
}

#[tokio::test]
async fn test_connect_lists_valid_targets_only() {
    let mut h = Harness::new(MockBehavior::default());
    let targets = h.client.connect(mock_params(), None).await.unwrap();

    let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["ionq.mock", "quantinuum.mock", "honeywell.mock", "qci.mock", "microsoft.mock", "mock.mock"]
    );
    assert!(!ids.contains(&"contoso.qpu"));
    assert_eq!(h.client.connection_status().unwrap(), targets);
    assert!(h.output.contains("Connected to Azure Quantum workspace WorkspaceNameWithMockProviders"));
}

#[tokio::test]
async fn test_connect_workspace_without_providers() {
    let mut h = Harness::new(MockBehavior::default());
    let params = ConnectionParams::new(SUBSCRIPTION, RESOURCE_GROUP, "EmptyWorkspace").with_location("westus");
    assert!(h.client.connect(params, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_with_resource_id() {
    let mut h = Harness::new(MockBehavior::default());
    let params = ConnectionParams::from_resource_id(format!(
        "/subscriptions/{SUBSCRIPTION}/RESOurceGroups/{RESOURCE_GROUP}/providers/microsoft.quantum/workspaces/{MOCK_PROVIDERS_WORKSPACE}"
    ))
    .with_location("eastus");

    let targets = h.client.connect(params, None).await.unwrap();
    assert_eq!(targets.len(), 6);
    let ws = h.client.workspace().unwrap().params();
    assert_eq!(ws.subscription_id, SUBSCRIPTION);
    assert_eq!(ws.location, "eastus");
}

#[tokio::test]
async fn test_connect_with_invalid_resource_id() {
    let mut h = Harness::new(MockBehavior::default());
    let params = ConnectionParams::from_resource_id("/subscriptions/s/resourceGroups/rg").with_location("westus");
    let err = h.client.connect(params, None).await.unwrap_err();
    assert_eq!(err.name(), "WorkspaceNotFound");
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_connect_requires_location() {
    let mut h = Harness::new(MockBehavior::default());
    let params = ConnectionParams::new(SUBSCRIPTION, RESOURCE_GROUP, MOCK_PROVIDERS_WORKSPACE);
    assert_eq!(
        h.client.connect(params, None).await.unwrap_err(),
        AzureClientError::NoWorkspaceLocation
    );

    let blank = mock_params().with_location("   ");
    assert_eq!(h.client.connect(blank, None).await.unwrap_err().name(), "InvalidWorkspaceLocation");
}

#[tokio::test]
async fn test_connect_normalizes_location() {
    let mut h = Harness::new(MockBehavior::default());
    h.client
        .connect(mock_params().with_location("Australia Central 2"), None)
        .await
        .unwrap();
    assert_eq!(h.client.workspace().unwrap().params().location, "australiacentral2");

    h.client
        .connect(mock_params().with_location("/test/"), None)
        .await
        .unwrap();
    assert_eq!(h.client.workspace().unwrap().params().location, "westus");
    assert!(h.output.contains("Falling back to location westus"));
}

#[tokio::test]
async fn test_connect_with_environment_credential_reads_variables() {
    let vars: HashMap<&'static str, &'static str> = [
        ("AZURE_QUANTUM_SUBSCRIPTION_ID", SUBSCRIPTION),
        ("AZUREQUANTUM_WORKSPACE_RG", RESOURCE_GROUP),
        ("AZURE_QUANTUM_WORKSPACE_NAME", MOCK_PROVIDERS_WORKSPACE),
        ("AZURE_QUANTUM_WORKSPACE_LOCATION", "West US 2"),
    ]
    .into_iter()
    .collect();
    let mut client = AzureClient::builder()
        .environment("mock")
        .env_lookup(Arc::new(move |key: &str| vars.get(key).map(|v| v.to_string())))
        .build()
        .unwrap();

    let params = ConnectionParams::default().with_credential(CredentialType::Environment);
    let targets = client.connect(params, None).await.unwrap();
    assert_eq!(targets.len(), 6);
    assert_eq!(client.workspace().unwrap().params().location, "westus2");
}

#[tokio::test]
async fn test_connect_with_missing_environment_variables() {
    let mut h = Harness::new(MockBehavior::default());
    let params = ConnectionParams::default().with_credential(CredentialType::Environment);
    assert_eq!(h.client.connect(params, None).await.unwrap_err().name(), "AuthenticationFailed");
}

#[tokio::test]
async fn test_connect_to_unreachable_workspace() {
    let mut h = Harness::new(MockBehavior {
        offline: true,
        ..MockBehavior::default()
    });
    let err = h.client.connect(mock_params(), None).await.unwrap_err();
    assert_eq!(err.name(), "WorkspaceNotFound");
    assert!(!h.client.is_connected());
}

#[tokio::test]
async fn test_connect_emits_event() {
    let mut h = Harness::new(MockBehavior::default());
    let mut events = h.client.subscribe();
    h.client.connect(mock_params(), None).await.unwrap();

    match events.recv().await.unwrap() {
        ClientEvent::Connected {
            status,
            credential,
            environment,
            targets,
            ..
        } => {
            assert_eq!(status, "success");
            assert_eq!(credential, "Default");
            assert_eq!(environment, "mock");
            assert_eq!(targets, 6);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let _ = h.client.connect(ConnectionParams::default(), None).await;
    match events.recv().await.unwrap() {
        ClientEvent::Connected { status, .. } => assert_eq!(status, "WorkspaceNotFound"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_reconnect_clears_active_target() {
    let mut h = Harness::with_target(MockBehavior::default(), "ionq.mock").await;
    assert_eq!(h.client.active_target().unwrap().id, "ionq.mock");

    h.client.connect(mock_params(), None).await.unwrap();
    assert_eq!(h.client.active_target().unwrap_err(), AzureClientError::NoTarget);
}

#[tokio::test]
async fn test_failed_reconnect_keeps_previous_state() {
    let mut h = Harness::with_target(MockBehavior::default(), "ionq.mock").await;
    let without_location = ConnectionParams::new(SUBSCRIPTION, RESOURCE_GROUP, "Other");
    assert!(h.client.connect(without_location, None).await.is_err());

    assert_eq!(h.client.active_target().unwrap().id, "ionq.mock");
    assert_eq!(
        h.client.workspace().unwrap().params().name,
        MOCK_PROVIDERS_WORKSPACE
    );
}

#[tokio::test]
async fn test_jobs_survive_reconnect() {
    let mut h = Harness::with_target(MockBehavior::default(), "ionq.mock").await;
    let job = h.client.submit_job(&context("HelloQ"), None).await.unwrap();

    h.client.connect(mock_params(), None).await.unwrap();
    assert_eq!(h.client.job_status(Some(&job.id), None).await.unwrap().id, job.id);
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dogfood_discovery_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/subscriptions/.+"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let mut client = AzureClient::builder()
        .environment("dogfood")
        .env_lookup(Arc::new(|_: &str| None))
        .management_endpoint(server.uri())
        .build()
        .unwrap();
    let err = client.connect(mock_params(), None).await.unwrap_err();
    assert_eq!(err.name(), "Configuration");
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_dogfood_discovery_populates_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/subscriptions/.+"))
        .respond_with(ResponseTemplate::new(401).insert_header(
            "WWW-Authenticate",
            r#"Bearer authorization_uri="https://login.example.com/tenant-id", error="invalid_token""#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(AuthorityCache::new());
    let mut client = AzureClient::builder()
        .environment("dogfood")
        .env_lookup(Arc::new(|_: &str| None))
        .management_endpoint(server.uri())
        .authority_cache(Arc::clone(&cache))
        .build()
        .unwrap();

    // The service principal variables are unset, so each attempt stops at
    // credential resolution after discovery has run.
    let params = mock_params().with_credential(CredentialType::Environment);
    let err = client.connect(params.clone(), None).await.unwrap_err();
    assert_eq!(err.name(), "AuthenticationFailed");
    let _ = client.connect(params, None).await;
    assert_eq!(
        cache.get(SUBSCRIPTION).as_deref(),
        Some("https://login.example.com/tenant-id")
    );
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_set_active_target() {
    let mut h = Harness::connected(MockBehavior::default()).await;
    assert_eq!(h.client.active_target().unwrap_err(), AzureClientError::NoTarget);

    let status = h.client.set_active_target("IonQ.Mock", None).await.unwrap();
    assert_eq!(status.id, "ionq.mock");
    assert!(h.output.contains("Loading package Microsoft.Quantum.Providers.IonQ"));
    assert_eq!(h.client.active_target().unwrap(), status);
}

#[tokio::test]
async fn test_set_invalid_target() {
    let mut h = Harness::connected(MockBehavior::default()).await;
    assert_eq!(
        h.client.set_active_target("contoso.qpu", None).await.unwrap_err(),
        AzureClientError::InvalidTarget("contoso.qpu".into())
    );
    assert_eq!(
        h.client.set_active_target("ionq.qpu", None).await.unwrap_err().name(),
        "InvalidTarget"
    );
    assert_eq!(h.client.set_active_target("  ", None).await.unwrap_err(), AzureClientError::NoTarget);
}

#[tokio::test]
async fn test_package_load_failure() {
    let mut h = Harness::with_loader(
        MockBehavior::default(),
        InMemoryPackageLoader::with_unavailable(["Microsoft.Quantum.Providers.IonQ"]),
    );
    h.client.connect(mock_params(), None).await.unwrap();
    assert_eq!(
        h.client.set_active_target("ionq.mock", None).await.unwrap_err().name(),
        "UnknownError"
    );
    assert_eq!(h.client.active_target().unwrap_err(), AzureClientError::NoTarget);
}

#[tokio::test]
async fn test_target_capability_override() {
    let mut h = Harness::connected(MockBehavior::default()).await;
    assert_eq!(
        h.client.set_target_capability("AdaptiveExecution").unwrap_err(),
        AzureClientError::NoTarget
    );

    h.client.set_active_target("mock.mock", None).await.unwrap();
    assert_eq!(h.client.target_capability().unwrap(), TargetCapability::FullComputation);
    assert_eq!(
        h.client.set_target_capability("BasicExecution").unwrap(),
        TargetCapability::BasicQuantumFunctionality
    );
    assert!(h.output.contains("Target capability set to BasicQuantumFunctionality."));

    let err = h
        .client
        .submit_job(&context("HelloAgain count=3 name=\"test\""), None)
        .await
        .unwrap_err();
    assert_eq!(err.name(), "InvalidEntryPoint");
    assert_eq!(h.job_count(), 0);

    h.client.set_active_target("mock.mock", None).await.unwrap();
    assert_eq!(h.client.target_capability().unwrap(), TargetCapability::FullComputation);
}

#[tokio::test]
async fn test_target_capability_clamped_to_provider() {
    let mut h = Harness::with_target(MockBehavior::default(), "quantinuum.mock").await;
    assert_eq!(
        h.client.set_target_capability("FullComputation").unwrap(),
        TargetCapability::BasicMeasurementFeedback
    );
    assert!(h.output.contains("supports at most BasicMeasurementFeedback"));
    assert_eq!(
        h.client.set_target_capability("Teleportation").unwrap_err(),
        AzureClientError::InvalidTargetCapability("Teleportation".into())
    );
    assert_eq!(
        h.client.target_capability().unwrap(),
        TargetCapability::BasicMeasurementFeedback
    );
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_submit_requires_target_and_operation() {
    let mut h = Harness::connected(MockBehavior::default()).await;
    assert_eq!(
        h.client.submit_job(&context("HelloQ"), None).await.unwrap_err(),
        AzureClientError::NoTarget
    );

    h.client.set_active_target("ionq.mock", None).await.unwrap();
    assert_eq!(
        h.client.submit_job(&SubmissionContext::default(), None).await.unwrap_err(),
        AzureClientError::NoOperationName
    );
    assert_eq!(
        h.client.submit_job(&context("NoSuchOperation"), None).await.unwrap_err(),
        AzureClientError::UnrecognizedOperationName("NoSuchOperation".into())
    );
    assert_eq!(h.job_count(), 0);
}

#[tokio::test]
async fn test_capability_mismatch_creates_no_job() {
    let mut h = Harness::with_target(MockBehavior::default(), "ionq.mock").await;
    let err = h
        .client
        .submit_job(&context("HelloAgain count=3 name=\"test\""), None)
        .await
        .unwrap_err();
    assert_eq!(err.name(), "InvalidEntryPoint");
    assert_eq!(h.job_count(), 0);
    assert!(h.client.most_recent_job_id().is_none());
}

#[tokio::test]
async fn test_missing_arguments_fail_before_submission() {
    let mut h = Harness::with_target(MockBehavior::default(), "mock.mock").await;
    let err = h.client.submit_job(&context("HelloAgain count=3"), None).await.unwrap_err();
    assert_eq!(err.name(), "JobSubmissionFailed");
    assert!(err.to_string().contains("name"));
    assert_eq!(h.job_count(), 0);
}

#[tokio::test]
async fn test_rejected_submission() {
    let mut h = Harness::with_target(
        MockBehavior {
            reject_submissions: true,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    assert_eq!(
        h.client.submit_job(&context("HelloQ"), None).await.unwrap_err().name(),
        "JobSubmissionFailed"
    );
}

#[tokio::test]
async fn test_submit_sends_arguments_and_job_params() {
    let mut h = Harness::with_target(MockBehavior::default(), "mock.mock").await;
    let job = h
        .client
        .submit_job(
            &context(r#"HelloAgain count=3 name="test" jobName=myjob shots=100 jobParams={"priority":"high","depth":2}"#),
            None,
        )
        .await
        .unwrap();

    assert_eq!(job.name, "myjob");
    assert_eq!(job.target, "mock.mock");
    assert_eq!(h.client.most_recent_job_id(), Some(job.id.as_str()));

    let submissions = h.factory.workspace(MOCK_PROVIDERS_WORKSPACE).unwrap().submissions();
    assert_eq!(submissions.len(), 1);
    let params = &submissions[0].input_params;
    assert_eq!(params["entryPoint"], "ENTRYPOINT__Microsoft__Quantum__SanityTests__HelloAgain");
    assert_eq!(params["shots"], 100);
    assert_eq!(params["priority"], "high");
    assert_eq!(params["depth"], "2");
    assert_eq!(
        params["arguments"],
        serde_json::json!([
            {"name": "count", "type": "Int", "value": 3},
            {"name": "name", "type": "String", "value": "test"},
        ])
    );
    assert_eq!(submissions[0].input_data_format, "qir.v1");
    assert!(h.output.contains(&format!("with id {}", job.id)));
}

// ---------------------------------------------------------------------------
// Status, results, listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_job_status_of_most_recent_job() {
    let mut h = Harness::with_target(MockBehavior::default(), "ionq.mock").await;
    assert_eq!(h.client.job_status(None, None).await.unwrap_err().name(), "JobNotFound");

    let job = h.client.submit_job(&context("HelloQ"), None).await.unwrap();
    let status = h.client.job_status(None, None).await.unwrap();
    assert_eq!(status.id, job.id);
    assert_eq!(status.state(), JobStatus::Succeeded);
}

#[tokio::test]
async fn test_job_status_unknown_id() {
    let h = Harness::connected(MockBehavior::default()).await;
    assert_eq!(
        h.client.job_status(Some("00000000-0000-0000-0000-000000000000"), None).await.unwrap_err(),
        AzureClientError::JobNotFound("00000000-0000-0000-0000-000000000000".into())
    );
}

#[tokio::test]
async fn test_job_result_states() {
    let mut h = Harness::with_target(
        MockBehavior {
            polls_until_complete: 1,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    let job = h.client.submit_job(&context("HelloQ"), None).await.unwrap();

    assert_eq!(
        h.client.job_result(Some(&job.id), None).await.unwrap_err(),
        AzureClientError::JobNotCompleted(job.id.clone())
    );
    let output = h.client.job_result(Some(&job.id), None).await.unwrap();
    let histogram = output.histogram.unwrap();
    assert_eq!(histogram.get("[0]"), Some(0.5));
    assert_eq!(histogram.get("[1]"), Some(0.5));
}

#[tokio::test]
async fn test_job_result_of_failed_job() {
    let mut h = Harness::with_target(
        MockBehavior {
            final_status: JobStatus::Failed,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    let job = h.client.submit_job(&context("HelloQ"), None).await.unwrap();
    assert_eq!(
        h.client.job_result(None, None).await.unwrap_err(),
        AzureClientError::JobFailedOrCancelled(job.id)
    );
}

#[tokio::test]
async fn test_job_list_filter_and_order() {
    let mut h = Harness::with_target(MockBehavior::default(), "ionq.mock").await;
    assert!(h.client.job_list(None, None, None).await.unwrap().is_empty());
    assert!(h.output.contains("No jobs found"));

    for name in ["alpha", "beta", "alphabet"] {
        h.client.submit_job(&context(&format!("HelloQ jobName={name}")), None).await.unwrap();
    }

    let all = h.client.job_list(None, None, None).await.unwrap();
    let names: Vec<&str> = all.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, vec!["alphabet", "beta", "alpha"]);

    let filtered = h.client.job_list(Some("ALPHA"), None, None).await.unwrap();
    assert_eq!(filtered.len(), 2);

    let newest = h.client.job_list(None, Some(1), None).await.unwrap();
    assert_eq!(newest[0].name, "alphabet");

    let by_target = h.client.job_list(Some("ionq.mock"), None, None).await.unwrap();
    assert_eq!(by_target.len(), 3);
}

#[tokio::test]
async fn test_quota_list() {
    let h = Harness::connected(MockBehavior::default()).await;
    let quotas = h.client.quota_list(None).await.unwrap();
    assert_eq!(quotas.len(), 6);
    assert!(quotas.iter().any(|q| q.provider_id == "ionq"));
}

// ---------------------------------------------------------------------------
// Execute
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_execute_returns_histogram() {
    let mut h = Harness::with_target(
        MockBehavior {
            polls_until_complete: 3,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    let started = tokio::time::Instant::now();
    let output = h.client.execute_job(&context("HelloQ poll=5"), None).await.unwrap();

    assert_eq!(output.histogram.map(|h| h.len()), Some(2));
    assert_eq!(started.elapsed(), Duration::from_secs(15));
    assert!(h.output.contains("status: Succeeded"));
}

#[tokio::test(start_paused = true)]
async fn test_execute_with_unbounded_timeout() {
    let mut h = Harness::with_target(
        MockBehavior {
            polls_until_complete: 2,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    let output = h
        .client
        .execute_job(&context("HelloQ timeout=18446744073709551615 poll=5"), None)
        .await
        .unwrap();

    assert_eq!(output.histogram.map(|h| h.len()), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_execute_times_out_without_cancelling_job() {
    let mut h = Harness::with_target(
        MockBehavior {
            polls_until_complete: 100,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    let err = h
        .client
        .execute_job(&context("HelloQ timeout=12 poll=5"), None)
        .await
        .unwrap_err();

    let job_id = h.client.most_recent_job_id().unwrap().to_string();
    assert_eq!(
        err,
        AzureClientError::JobExecutionTimedOut {
            job_id: job_id.clone(),
            timeout_secs: 12
        }
    );
    let job = h.client.job_status(Some(&job_id), None).await.unwrap();
    assert_eq!(job.state(), JobStatus::Executing);
}

#[tokio::test(start_paused = true)]
async fn test_execute_cancelled() {
    let mut h = Harness::with_target(
        MockBehavior {
            polls_until_complete: 100,
            ..MockBehavior::default()
        },
        "ionq.mock",
    )
    .await;
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        trigger.cancel();
    });

    let err = h
        .client
        .execute_job(&context("HelloQ timeout=60 poll=5"), Some(&token))
        .await
        .unwrap_err();
    assert_eq!(err.name(), "JobExecutionCancelled");
    assert_eq!(h.job_count(), 1);
}

#[tokio::test]
async fn test_cancelled_connect() {
    let mut h = Harness::new(MockBehavior::default());
    let token = CancellationToken::new();
    token.cancel();
    assert_eq!(
        h.client.connect(mock_params(), Some(&token)).await.unwrap_err(),
        AzureClientError::OperationCancelled
    );
    assert!(!h.client.is_connected());
}
