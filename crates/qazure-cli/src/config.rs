//! Configuration for the `qazure` session.
//!
//! Supports loading configuration from:
//! 1. A configuration file (YAML, default `~/.qazure/config.yaml`)
//! 2. Environment variables (with QAZURE_ prefix)
//! 3. .env files
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use qazure_client::{ConnectionParams, SubmissionDefaults};
use qazure_hal::{CredentialType, EnvironmentKind};

/// Complete session configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Deployment selector (`production`, `canary`, `dogfood`, `mock`).
    /// Falls back to `AZURE_QUANTUM_ENV` when unset.
    #[serde(default)]
    pub environment: Option<String>,

    /// Credential used by `%azure.connect` when none is given (`cli`,
    /// `device-code`, ...).
    #[serde(default)]
    pub credential: Option<String>,

    /// Program catalog file.
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Default workspace.
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Submission defaults.
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default workspace coordinates.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Subscription id.
    pub subscription: Option<String>,
    /// Resource group.
    pub resource_group: Option<String>,
    /// Workspace name.
    pub name: Option<String>,
    /// Workspace location.
    pub location: Option<String>,
    /// Storage account connection string.
    pub storage: Option<String>,
}

impl fmt::Debug for WorkspaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceConfig")
            .field("subscription", &self.subscription)
            .field("resource_group", &self.resource_group)
            .field("name", &self.name)
            .field("location", &self.location)
            .field("storage", &self.storage.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Submission defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Shots per job.
    #[serde(default = "default_shots")]
    pub shots: u32,

    /// How long `%azure.execute` waits, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Delay between status polls, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "console" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_shots() -> u32 {
    500
}

fn default_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "console".to_string()
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            shots: default_shots(),
            timeout_seconds: default_timeout(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Default configuration file (`~/.qazure/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".qazure").join("config.yaml"))
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {e}", path.as_ref().display())))?;

        let config: Config =
            serde_yaml_ng::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load .env file if it exists
    /// 2. Load from `config_file`, or the default file when it exists
    /// 3. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(path)?,
                None => Config::default(),
            },
        };

        config = config.merge_env(&|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Merge environment variables into this configuration.
    ///
    /// Only variables that are set override the current values.
    fn merge_env(mut self, lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("QAZURE_ENVIRONMENT") {
            self.environment = Some(v);
        }
        if let Some(v) = lookup("QAZURE_CREDENTIAL") {
            self.credential = Some(v);
        }
        if let Some(v) = lookup("QAZURE_CATALOG") {
            self.catalog = Some(PathBuf::from(v));
        }

        // Workspace
        if let Some(v) = lookup("QAZURE_SUBSCRIPTION") {
            self.workspace.subscription = Some(v);
        }
        if let Some(v) = lookup("QAZURE_RESOURCE_GROUP") {
            self.workspace.resource_group = Some(v);
        }
        if let Some(v) = lookup("QAZURE_WORKSPACE") {
            self.workspace.name = Some(v);
        }
        if let Some(v) = lookup("QAZURE_LOCATION") {
            self.workspace.location = Some(v);
        }
        if let Some(v) = lookup("QAZURE_STORAGE") {
            self.workspace.storage = Some(v);
        }

        // Submission
        if let Some(v) = lookup("QAZURE_SHOTS") {
            if let Ok(val) = v.parse() {
                self.submission.shots = val;
            }
        }
        if let Some(v) = lookup("QAZURE_TIMEOUT") {
            if let Ok(val) = v.parse() {
                self.submission.timeout_seconds = val;
            }
        }
        if let Some(v) = lookup("QAZURE_POLL_INTERVAL") {
            if let Ok(val) = v.parse() {
                self.submission.poll_interval_seconds = val;
            }
        }

        // Logging
        if let Some(v) = lookup("QAZURE_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("QAZURE_LOG_FORMAT") {
            self.logging.format = v;
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref env) = self.environment {
            let known = ["production", "canary", "dogfood", "test", "mock"];
            if !env.is_empty() && !known.contains(&env.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown environment: {env}"
                )));
            }
        }

        if let Some(ref credential) = self.credential {
            credential
                .parse::<CredentialType>()
                .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        }

        if self.submission.shots == 0 {
            return Err(ConfigError::ValidationError(
                "submission.shots must be greater than 0".to_string(),
            ));
        }
        if self.submission.poll_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "submission.poll_interval_seconds must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        match self.logging.format.as_str() {
            "console" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {other}"
                )));
            }
        }

        if let Some(ref storage) = self.workspace.storage {
            if storage.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "workspace.storage must not be empty; omit the field to use linked storage"
                        .to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Configured credential, `Default` when unset.
    pub fn credential(&self) -> CredentialType {
        self.credential
            .as_deref()
            .and_then(|c| c.parse().ok())
            .unwrap_or_default()
    }

    /// Deployment kind this configuration selects, `AZURE_QUANTUM_ENV` when unset.
    pub fn environment_kind(&self) -> EnvironmentKind {
        match self.environment {
            Some(ref env) => EnvironmentKind::parse(Some(env)),
            None => EnvironmentKind::from_env(),
        }
    }

    /// Submission defaults for `%azure.submit` and `%azure.execute`.
    pub fn submission_defaults(&self) -> SubmissionDefaults {
        SubmissionDefaults {
            shots: self.submission.shots,
            execution_timeout: Duration::from_secs(self.submission.timeout_seconds),
            execution_poll_interval: Duration::from_secs(self.submission.poll_interval_seconds),
        }
    }

    /// Fill what `params` leaves unset from the configured workspace.
    ///
    /// Coordinates are only filled when no resource id was given.
    pub fn apply_workspace(&self, params: &mut ConnectionParams, credential_given: bool) {
        let ws = &self.workspace;
        if params.resource_id.is_none() {
            params.subscription_id = params.subscription_id.take().or_else(|| ws.subscription.clone());
            params.resource_group = params.resource_group.take().or_else(|| ws.resource_group.clone());
            params.workspace = params.workspace.take().or_else(|| ws.name.clone());
        }
        params.location = params.location.take().or_else(|| ws.location.clone());
        params.storage = params.storage.take().or_else(|| ws.storage.clone());
        if !credential_given {
            params.credential = self.credential();
        }
    }

    /// Whether the configuration names a complete workspace.
    pub fn has_workspace(&self) -> bool {
        self.workspace.subscription.is_some()
            && self.workspace.resource_group.is_some()
            && self.workspace.name.is_some()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
