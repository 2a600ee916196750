//! The Azure Quantum client state machine.
//!
//! ```text
//!   Disconnected ──connect──→ Connected ──set_active_target──→ Connected + target
//!                               ↑  │                                │
//!                               └──┴────────── connect ─────────────┘
//! ```
//!
//! Every operation is total over (state, input): expected failures come back
//! as an [`AzureClientError`] and are also written to the output channel.
//! A failed connect leaves the previous state untouched; a successful one
//! always clears the active target.
//!
//! The client is single-flight: callers issue one operation at a time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use qazure_adapter_azure::AzureWorkspaceFactory;
use qazure_adapter_mock::MockWorkspaceFactory;
use qazure_hal::environment::{DEFAULT_LOCATION, ENVIRONMENT_VAR};
use qazure_hal::{
    AuthorityCache, AzureEnvironment, AzureJob, BufferedChannel, CredentialResolver,
    CredentialType, EnvironmentKind, EnvironmentResolver, ExecutionTarget, JobLookup, JobOutput,
    JobSubmission, LoginPrompt, NormalizedLocation, OutputChannel, ProviderStatus, Quota,
    TargetCapability, TargetStatus, TokenCache, UpdatableDisplay, Workspace, WorkspaceFactory,
    WorkspaceParams, normalize_location,
};

use crate::connection::ConnectionParams;
use crate::entry_point::{EntryPoint, EntryPointError, EntryPointGenerator, ProgramCatalog};
use crate::error::{AzureClientError, AzureResult};
use crate::events::ClientEvent;
use crate::packages::{InMemoryPackageLoader, PackageLoader};
use crate::poll::{PollOutcome, poll_until, with_cancellation};
use crate::submission::SubmissionContext;

/// Environment variable lookup.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

struct Connection {
    workspace: Arc<dyn Workspace>,
    environment: AzureEnvironment,
    targets: Vec<TargetStatus>,
}

struct ActiveTarget {
    target: ExecutionTarget,
    status: TargetStatus,
}

/// Targets of a provider listing whose provider is recognised.
pub fn valid_targets(providers: Vec<ProviderStatus>) -> Vec<TargetStatus> {
    providers
        .into_iter()
        .flat_map(|p| p.targets)
        .filter(|t| ExecutionTarget::is_valid(&t.id))
        .collect()
}

/// Orchestrates connect, target selection, submission and job queries.
pub struct AzureClient {
    output: Arc<dyn OutputChannel>,
    credentials: CredentialResolver,
    environments: EnvironmentResolver,
    environment_selector: Option<String>,
    env_lookup: EnvLookup,
    azure_factory: Arc<dyn WorkspaceFactory>,
    mock_factory: Arc<dyn WorkspaceFactory>,
    entry_points: Arc<dyn EntryPointGenerator>,
    packages: Arc<dyn PackageLoader>,
    events: broadcast::Sender<ClientEvent>,
    connection: Option<Connection>,
    active_target: Option<ActiveTarget>,
    most_recent_job: Option<String>,
}

impl std::fmt::Debug for AzureClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureClient")
            .field("environment", &self.environment_kind())
            .field("connected", &self.is_connected())
            .field(
                "active_target",
                &self.active_target.as_ref().map(|t| t.target.target_id.as_str()),
            )
            .finish()
    }
}

impl AzureClient {
    /// Start building a client.
    pub fn builder() -> AzureClientBuilder {
        AzureClientBuilder::default()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Whether a workspace connection exists.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Connected workspace.
    pub fn workspace(&self) -> Option<&Arc<dyn Workspace>> {
        self.connection.as_ref().map(|c| &c.workspace)
    }

    /// Environment of the current connection.
    pub fn environment(&self) -> Option<&AzureEnvironment> {
        self.connection.as_ref().map(|c| &c.environment)
    }

    /// Id of the last job submitted through this client.
    pub fn most_recent_job_id(&self) -> Option<&str> {
        self.most_recent_job.as_deref()
    }

    fn environment_kind(&self) -> EnvironmentKind {
        EnvironmentKind::parse(self.environment_selector.as_deref())
    }

    /// Print and return an error.
    fn fail<T>(&self, error: AzureClientError) -> AzureResult<T> {
        debug!(code = error.code(), name = error.name(), "{error}");
        self.output.write_line(&error.to_string());
        Err(error)
    }

    // -----------------------------------------------------------------------
    // Connect
    // -----------------------------------------------------------------------

    /// Connect to a workspace and return its valid targets.
    #[instrument(skip_all, fields(credential = %params.credential))]
    pub async fn connect(
        &mut self,
        params: ConnectionParams,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<Vec<TargetStatus>> {
        let started = Instant::now();
        let credential = params.credential;
        let result = self.open_connection(params, cancel).await;
        let duration = started.elapsed();

        let status = match &result {
            Ok(_) => "success".to_string(),
            Err(e) => e.name().to_string(),
        };
        let targets = result.as_ref().map(|c| c.targets.len()).unwrap_or(0);
        info!(
            status = %status,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            credential = %credential,
            environment = %self.environment_kind(),
            "connected"
        );
        // No subscribers is not an error.
        let _ = self.events.send(ClientEvent::Connected {
            status,
            duration,
            credential: credential.to_string(),
            environment: self.environment_kind().to_string(),
            targets,
        });

        match result {
            Ok(connection) => {
                let ws = connection.workspace.params();
                self.output.write_line(&format!(
                    "Connected to Azure Quantum workspace {} in location {}.",
                    ws.name, ws.location
                ));
                let targets = connection.targets.clone();
                self.connection = Some(connection);
                self.active_target = None;
                self.most_recent_job = None;
                Ok(targets)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn open_connection(
        &self,
        mut params: ConnectionParams,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<Connection> {
        if params.credential == CredentialType::Environment {
            let lookup = Arc::clone(&self.env_lookup);
            params.fill_from_lookup(&move |key: &str| lookup(key));
        }
        let coordinates = params.coordinates()?;

        let raw_location = params
            .location
            .as_deref()
            .ok_or(AzureClientError::NoWorkspaceLocation)?;
        let location = match normalize_location(raw_location) {
            NormalizedLocation::Valid(location) => location,
            NormalizedLocation::Defaulted { requested } => {
                warn!(requested = %requested, "invalid workspace location");
                self.output.write_line(&format!(
                    "Invalid location {requested} specified. Falling back to location {DEFAULT_LOCATION}."
                ));
                DEFAULT_LOCATION.to_string()
            }
            NormalizedLocation::Blank => {
                return Err(AzureClientError::InvalidWorkspaceLocation(raw_location.to_string()));
            }
        };

        let environment = with_cancellation(
            cancel,
            self.environments
                .resolve(self.environment_selector.as_deref(), &coordinates.subscription_id),
        )
        .await
        .ok_or(AzureClientError::OperationCancelled)?
        .map_err(|e| AzureClientError::Configuration(e.to_string()))?;

        let credential = self
            .credentials
            .resolve(params.credential, &environment)
            .ok_or_else(|| {
                AzureClientError::AuthenticationFailed(format!(
                    "the {} credential is not available",
                    params.credential
                ))
            })?;
        if !environment.is_mock() {
            with_cancellation(cancel, credential.get_token())
                .await
                .ok_or(AzureClientError::OperationCancelled)?
                .map_err(|e| AzureClientError::AuthenticationFailed(e.to_string()))?;
        }

        let workspace_params = WorkspaceParams {
            subscription_id: coordinates.subscription_id,
            resource_group: coordinates.resource_group,
            name: coordinates.workspace,
            location,
            storage: params.storage,
        };
        let factory = if environment.is_mock() {
            &self.mock_factory
        } else {
            &self.azure_factory
        };
        let not_found = || {
            AzureClientError::WorkspaceNotFound(format!(
                "{} in resource group {} of subscription {}",
                workspace_params.name, workspace_params.resource_group, workspace_params.subscription_id
            ))
        };

        let workspace = with_cancellation(cancel, factory.open(&workspace_params, &environment, credential))
            .await
            .ok_or(AzureClientError::OperationCancelled)?
            .ok_or_else(not_found)?;
        let providers = with_cancellation(cancel, workspace.providers())
            .await
            .ok_or(AzureClientError::OperationCancelled)?
            .ok_or_else(not_found)?;

        Ok(Connection {
            workspace,
            environment,
            targets: valid_targets(providers),
        })
    }

    /// Valid targets of the current connection.
    pub fn connection_status(&self) -> AzureResult<Vec<TargetStatus>> {
        match &self.connection {
            Some(connection) => Ok(connection.targets.clone()),
            None => self.fail(AzureClientError::NotConnected),
        }
    }

    // -----------------------------------------------------------------------
    // Targets
    // -----------------------------------------------------------------------

    /// Select the target jobs are submitted to, loading its provider package
    /// first when needed.
    #[instrument(skip(self, cancel))]
    pub async fn set_active_target(
        &mut self,
        target_id: &str,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<TargetStatus> {
        let Some(connection) = self.connection.as_ref() else {
            return self.fail(AzureClientError::NotConnected);
        };
        let target_id = target_id.trim();
        if target_id.is_empty() {
            return self.fail(AzureClientError::NoTarget);
        }
        let Some(status) = connection
            .targets
            .iter()
            .find(|t| t.id.eq_ignore_ascii_case(target_id))
            .cloned()
        else {
            return self.fail(AzureClientError::InvalidTarget(target_id.to_string()));
        };
        let Some(target) = ExecutionTarget::create(&status.id) else {
            return self.fail(AzureClientError::InvalidTarget(target_id.to_string()));
        };

        if !self.packages.is_loaded(&target.package_name) {
            self.output.write_line(&format!(
                "Loading package {} and dependencies...",
                target.package_name
            ));
            match with_cancellation(cancel, self.packages.ensure_loaded(&target.package_name)).await {
                None => return self.fail(AzureClientError::OperationCancelled),
                Some(Err(e)) => {
                    return self.fail(AzureClientError::UnknownError(format!(
                        "failed to load package {}: {e}",
                        target.package_name
                    )));
                }
                Some(Ok(())) => {}
            }
        }

        self.output
            .write_line(&format!("Loaded target {} ({}).", status.id, target.capability));
        self.active_target = Some(ActiveTarget {
            target,
            status: status.clone(),
        });
        Ok(status)
    }

    /// Status of the active target.
    pub fn active_target(&self) -> AzureResult<TargetStatus> {
        if self.connection.is_none() {
            return self.fail(AzureClientError::NotConnected);
        }
        match &self.active_target {
            Some(active) => Ok(active.status.clone()),
            None => self.fail(AzureClientError::NoTarget),
        }
    }

    /// Capability programs are compiled against for the active target.
    pub fn target_capability(&self) -> AzureResult<TargetCapability> {
        if self.connection.is_none() {
            return self.fail(AzureClientError::NotConnected);
        }
        match &self.active_target {
            Some(active) => Ok(active.target.capability),
            None => self.fail(AzureClientError::NoTarget),
        }
    }

    /// Override the capability of the active target. A level above what the
    /// provider supports is lowered to the provider maximum. Selecting a
    /// target again restores its default.
    #[instrument(skip(self))]
    pub fn set_target_capability(&mut self, capability: &str) -> AzureResult<TargetCapability> {
        if self.connection.is_none() {
            return self.fail(AzureClientError::NotConnected);
        }
        let Some(active) = self.active_target.as_ref() else {
            return self.fail(AzureClientError::NoTarget);
        };
        let Ok(requested) = capability.parse::<TargetCapability>() else {
            return self.fail(AzureClientError::InvalidTargetCapability(
                capability.trim().to_string(),
            ));
        };

        let max = active.target.provider.max_capability();
        let effective = requested.min(max);
        if effective != requested {
            warn!(%requested, %max, "capability lowered to provider maximum");
            self.output.write_line(&format!(
                "Target {} supports at most {max}; using {effective}.",
                active.status.id
            ));
        }
        if let Some(active) = self.active_target.as_mut() {
            active.target.capability = effective;
        }
        self.output.write_line(&format!("Target capability set to {effective}."));
        Ok(effective)
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit a job to the active target and return immediately.
    #[instrument(skip_all, fields(operation = %context.operation_name))]
    pub async fn submit_job(
        &mut self,
        context: &SubmissionContext,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<AzureJob> {
        match self.create_job(context, cancel).await {
            Ok(job) => {
                info!(job_id = %job.id, target = %job.target, "job submitted");
                self.output.write_line(&format!(
                    "Submitted job \"{}\" with id {} to target {}.",
                    job.name, job.id, job.target
                ));
                let _ = self.events.send(ClientEvent::JobSubmitted {
                    job_id: job.id.clone(),
                    target: job.target.clone(),
                });
                self.most_recent_job = Some(job.id.clone());
                Ok(job)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn create_job(
        &self,
        context: &SubmissionContext,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<AzureJob> {
        let connection = self.connection.as_ref().ok_or(AzureClientError::NotConnected)?;
        let active = self.active_target.as_ref().ok_or(AzureClientError::NoTarget)?;
        if context.operation_name.trim().is_empty() {
            return Err(AzureClientError::NoOperationName);
        }

        let entry_point = self
            .entry_points
            .generate(context.operation_name.trim(), active.target.capability)
            .map_err(entry_point_error)?;
        let submission = build_submission(&entry_point, context, &active.target)?;

        let machine = connection
            .workspace
            .create_machine(&active.target.target_id)
            .ok_or_else(|| {
                AzureClientError::JobSubmissionFailed(format!(
                    "no machine is available for target {}",
                    active.target.target_id
                ))
            })?;
        with_cancellation(cancel, machine.submit(&submission))
            .await
            .ok_or(AzureClientError::OperationCancelled)?
            .ok_or_else(|| {
                AzureClientError::JobSubmissionFailed(format!(
                    "the workspace did not accept the job for target {}",
                    active.target.target_id
                ))
            })
    }

    /// Submit a job and wait for its output.
    ///
    /// Waiting stops at the context's timeout or when `cancel` fires; the
    /// remote job is left running in both cases.
    #[instrument(skip_all, fields(operation = %context.operation_name))]
    pub async fn execute_job(
        &mut self,
        context: &SubmissionContext,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<JobOutput> {
        let job = self.submit_job(context, cancel).await?;
        match self.wait_for_output(&job, context, cancel).await {
            Ok(output) => Ok(output),
            Err(e) => self.fail(e),
        }
    }

    async fn wait_for_output(
        &self,
        job: &AzureJob,
        context: &SubmissionContext,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<JobOutput> {
        let connection = self.connection.as_ref().ok_or(AzureClientError::NotConnected)?;
        let workspace = connection.workspace.as_ref();
        let job_id = job.id.as_str();
        let timeout = context.execution_timeout;

        let display: Mutex<Box<dyn UpdatableDisplay>> = Mutex::new(self.output.display_updatable(
            &format!("Waiting up to {}s for job {job_id} to complete...", timeout.as_secs()),
        ));
        let display = &display;
        let started = Instant::now();

        let outcome = poll_until(context.execution_poll_interval, timeout, cancel, move || async move {
            match workspace.get_job(job_id).await {
                JobLookup::Found(current) => {
                    display
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .update(&format!(
                            "[{}s] Job {job_id} status: {}",
                            started.elapsed().as_secs(),
                            current.status
                        ));
                    current.state().is_terminal().then_some(current)
                }
                JobLookup::NotFound | JobLookup::Unavailable => None,
            }
        })
        .await;

        let finished = match outcome {
            PollOutcome::Completed(finished) => finished,
            PollOutcome::TimedOut => {
                return Err(AzureClientError::JobExecutionTimedOut {
                    job_id: job_id.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            PollOutcome::Cancelled => {
                return Err(AzureClientError::JobExecutionCancelled(job_id.to_string()));
            }
        };
        self.output_of(&finished, cancel).await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Status of a job, or of the most recently submitted one.
    #[instrument(skip(self, cancel))]
    pub async fn job_status(
        &self,
        job_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<AzureJob> {
        match self.lookup_job(job_id, cancel).await {
            Ok(job) => Ok(job),
            Err(e) => self.fail(e),
        }
    }

    /// Output of a completed job, or of the most recently submitted one.
    #[instrument(skip(self, cancel))]
    pub async fn job_result(
        &self,
        job_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<JobOutput> {
        let result = match self.lookup_job(job_id, cancel).await {
            Ok(job) if !job.state().is_terminal() => {
                Err(AzureClientError::JobNotCompleted(job.id))
            }
            Ok(job) => self.output_of(&job, cancel).await,
            Err(e) => Err(e),
        };
        result.or_else(|e| self.fail(e))
    }

    async fn lookup_job(
        &self,
        job_id: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<AzureJob> {
        let connection = self.connection.as_ref().ok_or(AzureClientError::NotConnected)?;
        let id = job_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.most_recent_job.clone())
            .ok_or_else(|| AzureClientError::JobNotFound("(none submitted yet)".to_string()))?;

        let lookup = with_cancellation(cancel, connection.workspace.get_job(&id))
            .await
            .ok_or(AzureClientError::OperationCancelled)?;
        match lookup {
            JobLookup::Found(job) => Ok(job),
            JobLookup::NotFound => Err(AzureClientError::JobNotFound(id)),
            JobLookup::Unavailable => {
                warn!(job_id = %id, "job lookup failed");
                Err(AzureClientError::JobNotFound(id))
            }
        }
    }

    async fn output_of(
        &self,
        job: &AzureJob,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<JobOutput> {
        if !job.state().is_success() {
            return Err(AzureClientError::JobFailedOrCancelled(job.id.clone()));
        }
        let connection = self.connection.as_ref().ok_or(AzureClientError::NotConnected)?;
        with_cancellation(cancel, connection.workspace.job_output(job))
            .await
            .ok_or(AzureClientError::OperationCancelled)?
            .ok_or_else(|| AzureClientError::JobOutputDownloadFailed(job.id.clone()))
    }

    /// Jobs matching `filter`, newest first, at most `count`.
    #[instrument(skip(self, cancel))]
    pub async fn job_list(
        &self,
        filter: Option<&str>,
        count: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> AzureResult<Vec<AzureJob>> {
        let Some(connection) = self.connection.as_ref() else {
            return self.fail(AzureClientError::NotConnected);
        };
        let jobs = match with_cancellation(cancel, connection.workspace.list_jobs(filter, count)).await {
            None => return self.fail(AzureClientError::OperationCancelled),
            Some(None) => {
                return self.fail(AzureClientError::WorkspaceNotFound(format!(
                    "jobs of {} could not be listed",
                    connection.workspace.params().name
                )));
            }
            Some(Some(jobs)) => jobs,
        };
        if jobs.is_empty() {
            self.output.write_line(match filter {
                Some(f) if !f.is_empty() => "No jobs matching the filter were found in the current Azure Quantum workspace.",
                _ => "No jobs found in the current Azure Quantum workspace.",
            });
        }
        Ok(jobs)
    }

    /// Quotas of the workspace.
    #[instrument(skip(self, cancel))]
    pub async fn quota_list(&self, cancel: Option<&CancellationToken>) -> AzureResult<Vec<Quota>> {
        let Some(connection) = self.connection.as_ref() else {
            return self.fail(AzureClientError::NotConnected);
        };
        match with_cancellation(cancel, connection.workspace.quotas()).await {
            None => self.fail(AzureClientError::OperationCancelled),
            Some(None) => self.fail(AzureClientError::WorkspaceNotFound(format!(
                "quotas of {} could not be listed",
                connection.workspace.params().name
            ))),
            Some(Some(quotas)) => Ok(quotas),
        }
    }
}

fn entry_point_error(error: EntryPointError) -> AzureClientError {
    match error {
        EntryPointError::UnknownOperation(operation) => {
            AzureClientError::UnrecognizedOperationName(operation)
        }
        EntryPointError::InvalidArguments(message) => AzureClientError::JobSubmissionFailed(message),
        other @ (EntryPointError::CapabilityMismatch { .. } | EntryPointError::Compilation(_)) => {
            AzureClientError::InvalidEntryPoint(other.to_string())
        }
    }
}

/// Job creation request for an entry point.
///
/// `inputParams` carries `entryPoint`, `arguments` and `shots`; provider
/// parameters are added as strings and never replace those keys.
fn build_submission(
    entry_point: &EntryPoint,
    context: &SubmissionContext,
    target: &ExecutionTarget,
) -> AzureResult<JobSubmission> {
    let arguments = entry_point
        .encode_arguments(&context.input_parameters)
        .map_err(|e| AzureClientError::JobSubmissionFailed(e.to_string()))?;

    let mut input_params = serde_json::Map::new();
    input_params.insert("entryPoint".into(), entry_point.entry_point_name().into());
    input_params.insert("arguments".into(), arguments);
    input_params.insert("shots".into(), context.shots.into());
    for (key, value) in &context.job_params {
        input_params
            .entry(key.clone())
            .or_insert_with(|| serde_json::Value::String(value.clone()));
    }

    Ok(JobSubmission {
        id: Uuid::new_v4().to_string(),
        name: context.job_name().to_string(),
        target: target.target_id.clone(),
        provider: target.provider.id().to_string(),
        input_data_format: entry_point.input_format.clone(),
        output_data_format: entry_point.output_format.clone(),
        input_data: entry_point.qir.clone(),
        input_params,
    })
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`AzureClient`].
#[derive(Default)]
pub struct AzureClientBuilder {
    output: Option<(Arc<dyn OutputChannel>, Arc<dyn LoginPrompt>)>,
    environment: Option<String>,
    env_lookup: Option<EnvLookup>,
    token_cache: Option<Arc<TokenCache>>,
    authority_cache: Option<Arc<AuthorityCache>>,
    management_endpoint: Option<String>,
    azure_factory: Option<Arc<dyn WorkspaceFactory>>,
    mock_factory: Option<Arc<dyn WorkspaceFactory>>,
    entry_points: Option<Arc<dyn EntryPointGenerator>>,
    packages: Option<Arc<dyn PackageLoader>>,
}

impl AzureClientBuilder {
    /// Channel for diagnostics and login prompts.
    pub fn output<C: OutputChannel + 'static>(mut self, channel: C) -> Self {
        let channel = Arc::new(channel);
        let prompt: Arc<dyn LoginPrompt> = channel.clone();
        let output: Arc<dyn OutputChannel> = channel;
        self.output = Some((output, prompt));
        self
    }

    /// Deployment selector; defaults to `AZURE_QUANTUM_ENV`.
    pub fn environment(mut self, selector: impl Into<String>) -> Self {
        self.environment = Some(selector.into());
        self
    }

    /// Environment variable source; defaults to the process environment.
    pub fn env_lookup(mut self, lookup: EnvLookup) -> Self {
        self.env_lookup = Some(lookup);
        self
    }

    /// Persistent token cache for user logins.
    pub fn token_cache(mut self, cache: Arc<TokenCache>) -> Self {
        self.token_cache = Some(cache);
        self
    }

    /// Shared subscription→authority cache.
    pub fn authority_cache(mut self, cache: Arc<AuthorityCache>) -> Self {
        self.authority_cache = Some(cache);
        self
    }

    /// Resource manager endpoint used for authority discovery.
    pub fn management_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.management_endpoint = Some(endpoint.into());
        self
    }

    /// Factory for real workspaces.
    pub fn workspace_factory(mut self, factory: Arc<dyn WorkspaceFactory>) -> Self {
        self.azure_factory = Some(factory);
        self
    }

    /// Factory for mock-environment workspaces.
    pub fn mock_factory(mut self, factory: Arc<dyn WorkspaceFactory>) -> Self {
        self.mock_factory = Some(factory);
        self
    }

    /// Compiler collaborator.
    pub fn entry_points(mut self, generator: Arc<dyn EntryPointGenerator>) -> Self {
        self.entry_points = Some(generator);
        self
    }

    /// Package loader collaborator.
    pub fn package_loader(mut self, loader: Arc<dyn PackageLoader>) -> Self {
        self.packages = Some(loader);
        self
    }

    /// Build the client.
    pub fn build(self) -> AzureResult<AzureClient> {
        let (output, prompt) = self.output.unwrap_or_else(|| {
            let channel = Arc::new(BufferedChannel::new());
            let prompt: Arc<dyn LoginPrompt> = channel.clone();
            (channel as Arc<dyn OutputChannel>, prompt)
        });
        let env_lookup = self
            .env_lookup
            .unwrap_or_else(|| Arc::new(|key: &str| std::env::var(key).ok()));
        let environment_selector = self.environment.or_else(|| env_lookup(ENVIRONMENT_VAR));

        let credentials = CredentialResolver::new(self.token_cache, prompt)
            .map_err(|e| AzureClientError::Configuration(e.to_string()))?;
        let mut environments =
            EnvironmentResolver::new(self.authority_cache.unwrap_or_default())
                .map_err(|e| AzureClientError::Configuration(e.to_string()))?;
        if let Some(endpoint) = self.management_endpoint {
            environments = environments.with_management_endpoint(endpoint);
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(AzureClient {
            output,
            credentials,
            environments,
            environment_selector,
            env_lookup,
            azure_factory: self
                .azure_factory
                .unwrap_or_else(|| Arc::new(AzureWorkspaceFactory)),
            mock_factory: self
                .mock_factory
                .unwrap_or_else(|| Arc::new(MockWorkspaceFactory::new())),
            entry_points: self
                .entry_points
                .unwrap_or_else(|| Arc::new(ProgramCatalog::default())),
            packages: self
                .packages
                .unwrap_or_else(|| Arc::new(InMemoryPackageLoader::new())),
            events,
            connection: None,
            active_target: None,
            most_recent_job: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, targets: &[&str]) -> ProviderStatus {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "currentAvailability": "Available",
            "targets": targets.iter().map(|t| serde_json::json!({"id": t})).collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_targets_drops_unknown_providers() {
        let targets = valid_targets(vec![
            provider("ionq", &["ionq.qpu", "ionq.simulator"]),
            provider("contoso", &["contoso.qpu"]),
        ]);
        let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["ionq.qpu", "ionq.simulator"]);
    }

    #[test]
    fn test_entry_point_error_mapping() {
        assert_eq!(
            entry_point_error(EntryPointError::UnknownOperation("X".into())).name(),
            "UnrecognizedOperationName"
        );
        assert_eq!(
            entry_point_error(EntryPointError::Compilation("bad".into())).name(),
            "InvalidEntryPoint"
        );
        assert_eq!(
            entry_point_error(EntryPointError::InvalidArguments("missing".into())).name(),
            "JobSubmissionFailed"
        );
    }

    #[test]
    fn test_build_submission_params() {
        let entry_point = EntryPoint {
            operation_name: "Samples.Hello".into(),
            parameters: Vec::new(),
            required_capability: qazure_hal::TargetCapability::BasicQuantumFunctionality,
            qir: b"qir".to_vec(),
            input_format: "qir.v1".into(),
            output_format: "microsoft.quantum-results.v1".into(),
        };
        let mut context = SubmissionContext::for_operation("Samples.Hello");
        context.shots = 7;
        context.job_params.insert("k".into(), "v".into());
        context.job_params.insert("shots".into(), "1".into());
        let target = ExecutionTarget::create("ionq.simulator").unwrap();

        let submission = build_submission(&entry_point, &context, &target).unwrap();
        assert_eq!(submission.name, "Samples.Hello");
        assert_eq!(submission.provider, "ionq");
        assert_eq!(submission.input_params["k"], "v");
        assert_eq!(submission.input_params["shots"], 7);
        assert_eq!(submission.input_params["entryPoint"], "ENTRYPOINT__Samples__Hello");
        assert_eq!(submission.input_params["arguments"], serde_json::json!([]));
    }

    #[test]
    fn test_builder_defaults_to_env_selector() {
        let client = AzureClient::builder()
            .env_lookup(Arc::new(|key: &str| (key == ENVIRONMENT_VAR).then(|| "mock".to_string())))
            .build()
            .unwrap();
        assert_eq!(client.environment_kind(), EnvironmentKind::Mock);
        assert!(!client.is_connected());
    }
}
