//! In-memory workspace.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rustc_hash::FxHashMap;
use tracing::debug;

use qazure_hal::{
    AzureEnvironment, AzureJob, Histogram, JobLookup, JobOutput, JobStatus, JobSubmission,
    Provider, ProviderStatus, QuantumMachine, Quota, TargetStatus, TokenProvider, Workspace,
    WorkspaceFactory, WorkspaceParams,
};

/// The only workspace name that exposes providers.
pub const MOCK_PROVIDERS_WORKSPACE: &str = "WorkspaceNameWithMockProviders";

/// Target of a provider no client package exists for.
pub const UNRECOGNIZED_TARGET: &str = "contoso.qpu";

/// How mock jobs progress.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Status queries answered with `Executing` before the job finishes.
    pub polls_until_complete: u32,
    /// Status the job ends in.
    pub final_status: JobStatus,
    /// Fail every submission.
    pub reject_submissions: bool,
    /// Make every query fail as if the service were unreachable.
    pub offline: bool,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            polls_until_complete: 0,
            final_status: JobStatus::Succeeded,
            reject_submissions: false,
            offline: false,
        }
    }
}

struct MockJob {
    job: AzureJob,
    polls_remaining: u32,
}

#[derive(Default)]
struct MockState {
    jobs: Vec<MockJob>,
    submissions: Vec<JobSubmission>,
    sequence: i64,
}

/// A workspace whose jobs live in memory.
pub struct MockWorkspace {
    params: WorkspaceParams,
    behavior: MockBehavior,
    state: Arc<Mutex<MockState>>,
}

impl MockWorkspace {
    /// Create an empty workspace.
    pub fn new(params: WorkspaceParams, behavior: MockBehavior) -> Self {
        Self {
            params,
            behavior,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Every submission received so far, in order.
    pub fn submissions(&self) -> Vec<JobSubmission> {
        self.lock().submissions.clone()
    }

    /// Number of jobs created.
    pub fn job_count(&self) -> usize {
        self.lock().jobs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_providers(&self) -> bool {
        self.params.name == MOCK_PROVIDERS_WORKSPACE
    }
}

/// Provider listing of [`MOCK_PROVIDERS_WORKSPACE`]: one `<provider>.mock`
/// target per known provider plus [`UNRECOGNIZED_TARGET`].
pub fn mock_providers() -> Vec<ProviderStatus> {
    let target = |id: String| TargetStatus {
        id,
        current_availability: "Available".to_string(),
        average_queue_time: 0,
        status_page: None,
    };
    let mut providers: Vec<ProviderStatus> = Provider::KNOWN
        .iter()
        .map(|p| ProviderStatus {
            id: p.id().to_string(),
            current_availability: "Available".to_string(),
            targets: vec![target(format!("{}.mock", p.id()))],
        })
        .collect();
    providers.push(ProviderStatus {
        id: "contoso".to_string(),
        current_availability: "Available".to_string(),
        targets: vec![target(UNRECOGNIZED_TARGET.to_string())],
    });
    providers
}

#[async_trait]
impl Workspace for MockWorkspace {
    fn params(&self) -> &WorkspaceParams {
        &self.params
    }

    async fn providers(&self) -> Option<Vec<ProviderStatus>> {
        if self.behavior.offline {
            return None;
        }
        Some(if self.has_providers() {
            mock_providers()
        } else {
            Vec::new()
        })
    }

    async fn get_job(&self, job_id: &str) -> JobLookup {
        if self.behavior.offline {
            return JobLookup::Unavailable;
        }
        let mut state = self.lock();
        let Some(entry) = state.jobs.iter_mut().find(|j| j.job.id == job_id) else {
            return JobLookup::NotFound;
        };
        if entry.polls_remaining > 0 {
            entry.polls_remaining -= 1;
            entry.job.status = JobStatus::Executing.to_string();
            entry.job.begin_execution_time.get_or_insert_with(Utc::now);
        } else if !entry.job.state().is_terminal() {
            entry.job.status = self.behavior.final_status.to_string();
            entry.job.end_execution_time = Some(Utc::now());
        }
        JobLookup::Found(entry.job.clone())
    }

    async fn jobs(&self) -> Option<Vec<AzureJob>> {
        if self.behavior.offline {
            return None;
        }
        Some(self.lock().jobs.iter().map(|j| j.job.clone()).collect())
    }

    async fn quotas(&self) -> Option<Vec<Quota>> {
        if self.behavior.offline {
            return None;
        }
        if !self.has_providers() {
            return Some(Vec::new());
        }
        Some(
            Provider::KNOWN
                .iter()
                .map(|p| Quota {
                    dimension: "qgs".to_string(),
                    scope: "Subscription".to_string(),
                    provider_id: p.id().to_string(),
                    utilization: 0.0,
                    holds: 0.0,
                    limit: 1000.0,
                    period: "Monthly".to_string(),
                })
                .collect(),
        )
    }

    fn create_machine(&self, target_id: &str) -> Option<Arc<dyn QuantumMachine>> {
        Some(Arc::new(MockMachine {
            target_id: target_id.to_string(),
            behavior: self.behavior.clone(),
            state: Arc::clone(&self.state),
        }))
    }

    async fn job_output(&self, job: &AzureJob) -> Option<JobOutput> {
        if self.behavior.offline || !job.state().is_success() {
            return None;
        }
        let mut histogram = Histogram::new();
        histogram.insert("[0]", 0.5);
        histogram.insert("[1]", 0.5);
        Some(JobOutput::with_histogram(
            job.id.clone(),
            job.output_data_format.clone(),
            histogram,
        ))
    }
}

/// Records submissions into the owning [`MockWorkspace`].
pub struct MockMachine {
    target_id: String,
    behavior: MockBehavior,
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl QuantumMachine for MockMachine {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn submit(&self, submission: &JobSubmission) -> Option<AzureJob> {
        if self.behavior.offline || self.behavior.reject_submissions {
            return None;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.sequence += 1;
        // Strictly increasing creation times keep newest-first ordering stable.
        let created = Utc::now() + Duration::milliseconds(state.sequence);
        let job = AzureJob {
            id: submission.id.clone(),
            name: submission.name.clone(),
            status: JobStatus::Waiting.to_string(),
            provider_id: submission.provider.clone(),
            target: self.target_id.clone(),
            container_uri: None,
            input_data_uri: None,
            input_data_format: Some(submission.input_data_format.clone()),
            input_params: Some(serde_json::Value::Object(submission.input_params.clone())),
            output_data_uri: Some(format!("mock://{}/outputData", submission.id)),
            output_data_format: Some(submission.output_data_format.clone()),
            creation_time: Some(created),
            begin_execution_time: None,
            end_execution_time: None,
            error_data: None,
        };
        state.submissions.push(submission.clone());
        state.jobs.push(MockJob {
            job: job.clone(),
            polls_remaining: self.behavior.polls_until_complete,
        });
        debug!(job_id = %job.id, target = %self.target_id, "mock job created");
        Some(job)
    }
}

/// Opens [`MockWorkspace`]s, handing out the same instance for the same
/// workspace coordinates and location so jobs survive a reconnect.
#[derive(Default)]
pub struct MockWorkspaceFactory {
    behavior: MockBehavior,
    workspaces: Mutex<FxHashMap<(String, String, String, String), Arc<MockWorkspace>>>,
}

impl MockWorkspaceFactory {
    /// Factory with default job behaviour.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory whose workspaces use `behavior`.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            workspaces: Mutex::new(FxHashMap::default()),
        }
    }

    /// The workspace opened for `name`, if any.
    pub fn workspace(&self, name: &str) -> Option<Arc<MockWorkspace>> {
        self.workspaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|ws| ws.params.name == name)
            .cloned()
    }
}

#[async_trait]
impl WorkspaceFactory for MockWorkspaceFactory {
    async fn open(
        &self,
        params: &WorkspaceParams,
        _environment: &AzureEnvironment,
        _credential: Arc<dyn TokenProvider>,
    ) -> Option<Arc<dyn Workspace>> {
        let key = (
            params.subscription_id.clone(),
            params.resource_group.clone(),
            params.name.clone(),
            params.location.clone(),
        );
        let mut workspaces = self.workspaces.lock().unwrap_or_else(PoisonError::into_inner);
        let ws = workspaces
            .entry(key)
            .or_insert_with(|| Arc::new(MockWorkspace::new(params.clone(), self.behavior.clone())));
        Some(Arc::clone(ws) as Arc<dyn Workspace>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qazure_hal::{ExecutionTarget, StaticTokenProvider};

    fn params(name: &str) -> WorkspaceParams {
        WorkspaceParams {
            subscription_id: "test".into(),
            resource_group: "test".into(),
            name: name.into(),
            location: "westus".into(),
            storage: None,
        }
    }

    fn submission(id: &str) -> JobSubmission {
        JobSubmission {
            id: id.into(),
            name: "test".into(),
            target: "ionq.mock".into(),
            provider: "ionq".into(),
            input_data_format: "qir.v1".into(),
            output_data_format: "microsoft.quantum-results.v1".into(),
            input_data: Vec::new(),
            input_params: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_only_named_workspace_has_providers() {
        let empty = MockWorkspace::new(params("test"), MockBehavior::default());
        assert_eq!(empty.providers().await, Some(Vec::new()));

        let full = MockWorkspace::new(params(MOCK_PROVIDERS_WORKSPACE), MockBehavior::default());
        let targets: Vec<String> = full
            .providers()
            .await
            .unwrap()
            .into_iter()
            .flat_map(|p| p.targets)
            .map(|t| t.id)
            .collect();
        assert_eq!(targets.len(), Provider::KNOWN.len() + 1);
        assert!(targets.contains(&UNRECOGNIZED_TARGET.to_string()));
        assert_eq!(
            targets.iter().filter(|t| ExecutionTarget::is_valid(t)).count(),
            Provider::KNOWN.len()
        );
    }

    #[tokio::test]
    async fn test_job_progresses_to_final_status() {
        let behavior = MockBehavior {
            polls_until_complete: 2,
            ..MockBehavior::default()
        };
        let ws = MockWorkspace::new(params(MOCK_PROVIDERS_WORKSPACE), behavior);
        let machine = ws.create_machine("ionq.mock").unwrap();
        let job = machine.submit(&submission("j1")).await.unwrap();
        assert_eq!(job.state(), JobStatus::Waiting);

        let states: Vec<JobStatus> = [
            ws.get_job("j1").await,
            ws.get_job("j1").await,
            ws.get_job("j1").await,
        ]
        .into_iter()
        .map(|l| l.into_job().unwrap().state())
        .collect();
        assert_eq!(
            states,
            vec![JobStatus::Executing, JobStatus::Executing, JobStatus::Succeeded]
        );

        let job = ws.get_job("j1").await.into_job().unwrap();
        let output = ws.job_output(&job).await.unwrap();
        assert_eq!(output.histogram.map(|h| h.len()), Some(2));
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let ws = MockWorkspace::new(params("test"), MockBehavior::default());
        assert_eq!(ws.get_job("missing").await, JobLookup::NotFound);
    }

    #[tokio::test]
    async fn test_offline_workspace_reports_unavailable() {
        let behavior = MockBehavior {
            offline: true,
            ..MockBehavior::default()
        };
        let ws = MockWorkspace::new(params(MOCK_PROVIDERS_WORKSPACE), behavior);
        assert!(ws.providers().await.is_none());
        assert_eq!(ws.get_job("x").await, JobLookup::Unavailable);
        assert!(ws.create_machine("ionq.mock").unwrap().submit(&submission("x")).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_job_has_no_output() {
        let behavior = MockBehavior {
            final_status: JobStatus::Failed,
            ..MockBehavior::default()
        };
        let ws = MockWorkspace::new(params(MOCK_PROVIDERS_WORKSPACE), behavior);
        ws.create_machine("ionq.mock").unwrap().submit(&submission("f")).await.unwrap();
        let job = ws.get_job("f").await.into_job().unwrap();
        assert_eq!(job.state(), JobStatus::Failed);
        assert!(ws.job_output(&job).await.is_none());
    }

    #[tokio::test]
    async fn test_factory_reuses_workspace() {
        let factory = MockWorkspaceFactory::new();
        let env = AzureEnvironment::mock();
        let token: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::new("t"));

        let first = factory.open(&params("test"), &env, Arc::clone(&token)).await.unwrap();
        first.create_machine("ionq.mock").unwrap().submit(&submission("a")).await.unwrap();
        let second = factory.open(&params("test"), &env, token).await.unwrap();
        assert_eq!(second.jobs().await.unwrap().len(), 1);
        assert_eq!(factory.workspace("test").unwrap().job_count(), 1);
    }
}
