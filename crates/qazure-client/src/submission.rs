//! Submission context.
//!
//! One [`SubmissionContext`] is built per submit/execute command. Reserved
//! keys set job options; every other `key=value` is an input parameter of the
//! operation.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AzureClientError, AzureResult};
use crate::magic::MagicArguments;

/// Key of the friendly job name.
pub const PARAMETER_JOB_NAME: &str = "jobName";
/// Key of the shot count.
pub const PARAMETER_SHOTS: &str = "shots";
/// Key of the execution timeout in seconds.
pub const PARAMETER_TIMEOUT: &str = "timeout";
/// Key of the polling interval in seconds.
pub const PARAMETER_POLL: &str = "poll";
/// Key of the provider-specific JSON parameters.
pub const PARAMETER_JOB_PARAMS: &str = "jobParams";

const RESERVED: [&str; 5] = [
    PARAMETER_JOB_NAME,
    PARAMETER_SHOTS,
    PARAMETER_TIMEOUT,
    PARAMETER_POLL,
    PARAMETER_JOB_PARAMS,
];

/// Defaults applied to options not given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionDefaults {
    /// Shots per job.
    pub shots: u32,
    /// How long execute waits for a result.
    pub execution_timeout: Duration,
    /// Delay between status polls.
    pub execution_poll_interval: Duration,
}

impl Default for SubmissionDefaults {
    fn default() -> Self {
        Self {
            shots: 500,
            execution_timeout: Duration::from_secs(30),
            execution_poll_interval: Duration::from_secs(5),
        }
    }
}

/// Options of one job submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContext {
    /// Friendly job name; the operation name when empty.
    pub friendly_name: String,
    /// Number of shots.
    pub shots: u32,
    /// Operation to run.
    pub operation_name: String,
    /// Operation arguments by parameter name.
    pub input_parameters: BTreeMap<String, String>,
    /// Provider-specific parameters, passed through as strings.
    pub job_params: BTreeMap<String, String>,
    /// How long execute waits for a terminal state.
    pub execution_timeout: Duration,
    /// Delay between status polls.
    pub execution_poll_interval: Duration,
}

impl Default for SubmissionContext {
    fn default() -> Self {
        Self::with_defaults(SubmissionDefaults::default())
    }
}

impl SubmissionContext {
    /// Empty context using `defaults`.
    pub fn with_defaults(defaults: SubmissionDefaults) -> Self {
        Self {
            friendly_name: String::new(),
            shots: defaults.shots,
            operation_name: String::new(),
            input_parameters: BTreeMap::new(),
            job_params: BTreeMap::new(),
            execution_timeout: defaults.execution_timeout,
            execution_poll_interval: defaults.execution_poll_interval,
        }
    }

    /// Context for `operation` with default options.
    pub fn for_operation(operation: impl Into<String>) -> Self {
        Self {
            operation_name: operation.into(),
            ..Self::default()
        }
    }

    /// Parse command arguments (`Op shots=1 k=v jobParams={...}`).
    pub fn parse(input: &str, defaults: SubmissionDefaults) -> AzureResult<Self> {
        let args = MagicArguments::parse(input)
            .map_err(|e| AzureClientError::JobSubmissionFailed(e.to_string()))?;
        Self::from_arguments(&args, defaults)
    }

    /// Build a context from parsed arguments.
    pub fn from_arguments(args: &MagicArguments, defaults: SubmissionDefaults) -> AzureResult<Self> {
        let mut context = Self::with_defaults(defaults);
        context.operation_name = args.first().unwrap_or_default().to_string();

        if let Some(name) = args.get(PARAMETER_JOB_NAME) {
            context.friendly_name = name.to_string();
        }
        if let Some(shots) = args.get(PARAMETER_SHOTS) {
            context.shots = parse_number(PARAMETER_SHOTS, shots)?;
        }
        if let Some(timeout) = args.get(PARAMETER_TIMEOUT) {
            context.execution_timeout = Duration::from_secs(parse_number(PARAMETER_TIMEOUT, timeout)?);
        }
        if let Some(poll) = args.get(PARAMETER_POLL) {
            let seconds: u64 = parse_number(PARAMETER_POLL, poll)?;
            if seconds == 0 {
                return Err(AzureClientError::JobSubmissionFailed(format!(
                    "The value {poll} provided for parameter {PARAMETER_POLL} must be at least 1."
                )));
            }
            context.execution_poll_interval = Duration::from_secs(seconds);
        }
        if let Some(json) = args.get(PARAMETER_JOB_PARAMS) {
            context.job_params = decode_job_params(json)?;
        }

        for (key, value) in &args.named {
            if !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(key)) {
                context.input_parameters.insert(key.clone(), value.clone());
            }
        }
        Ok(context)
    }

    /// Job name sent to the service.
    pub fn job_name(&self) -> &str {
        if self.friendly_name.is_empty() {
            &self.operation_name
        } else {
            &self.friendly_name
        }
    }

    /// Provider parameters as a JSON object string.
    pub fn job_params_json(&self) -> String {
        serde_json::to_string(&self.job_params).unwrap_or_else(|_| "{}".to_string())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> AzureResult<T> {
    value.trim().parse().map_err(|_| {
        AzureClientError::JobSubmissionFailed(format!(
            "The value {value} provided for parameter {key} is not a valid number."
        ))
    })
}

/// Decode a `jobParams` JSON object. String values are kept verbatim; other
/// values keep their JSON text.
pub fn decode_job_params(json: &str) -> AzureResult<BTreeMap<String, String>> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| {
            AzureClientError::JobSubmissionFailed(format!(
                "The value provided for {PARAMETER_JOB_PARAMS} is not a JSON object: {e}"
            ))
        })?;
    Ok(object
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}
