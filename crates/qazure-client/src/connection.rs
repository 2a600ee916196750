//! Connection parameters.
//!
//! A workspace is named either by its three coordinates or by its ARM
//! resource id. With the environment credential, missing coordinates are
//! read from `AZURE_QUANTUM_*` variables (legacy `AZUREQUANTUM_*` names are
//! still honoured; the new names win).

use std::sync::LazyLock;

use regex::Regex;

use qazure_hal::CredentialType;

use crate::error::{AzureClientError, AzureResult};
use crate::magic::MagicArguments;

static RESOURCE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/Microsoft\.Quantum/Workspaces/([^/]+)/?$",
    )
    .expect("Invalid resource id regex")
});

/// Workspace variables: (current name, legacy name).
pub const SUBSCRIPTION_VARS: (&str, &str) =
    ("AZURE_QUANTUM_SUBSCRIPTION_ID", "AZUREQUANTUM_SUBSCRIPTION_ID");
/// Resource group variables.
pub const RESOURCE_GROUP_VARS: (&str, &str) =
    ("AZURE_QUANTUM_WORKSPACE_RG", "AZUREQUANTUM_WORKSPACE_RG");
/// Workspace name variables.
pub const WORKSPACE_VARS: (&str, &str) =
    ("AZURE_QUANTUM_WORKSPACE_NAME", "AZUREQUANTUM_WORKSPACE_NAME");
/// Location variables.
pub const LOCATION_VARS: (&str, &str) = (
    "AZURE_QUANTUM_WORKSPACE_LOCATION",
    "AZUREQUANTUM_WORKSPACE_LOCATION",
);

/// Subscription, resource group and workspace name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceCoordinates {
    /// Subscription id.
    pub subscription_id: String,
    /// Resource group.
    pub resource_group: String,
    /// Workspace name.
    pub workspace: String,
}

/// Parse `/subscriptions/<s>/resourceGroups/<rg>/providers/Microsoft.Quantum/Workspaces/<ws>`.
/// Segment names are matched case-insensitively.
pub fn parse_resource_id(resource_id: &str) -> Option<WorkspaceCoordinates> {
    let caps = RESOURCE_ID.captures(resource_id.trim())?;
    Some(WorkspaceCoordinates {
        subscription_id: caps[1].to_string(),
        resource_group: caps[2].to_string(),
        workspace: caps[3].to_string(),
    })
}

/// Arguments of a connect call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionParams {
    /// ARM resource id; overrides the coordinates below.
    pub resource_id: Option<String>,
    /// Subscription id.
    pub subscription_id: Option<String>,
    /// Resource group.
    pub resource_group: Option<String>,
    /// Workspace name.
    pub workspace: Option<String>,
    /// Storage account connection string.
    pub storage: Option<String>,
    /// Workspace location.
    pub location: Option<String>,
    /// Credential strategy.
    pub credential: CredentialType,
}

impl ConnectionParams {
    /// Parameters for explicit coordinates.
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: Some(subscription_id.into()),
            resource_group: Some(resource_group.into()),
            workspace: Some(workspace.into()),
            ..Self::default()
        }
    }

    /// Parameters for a resource id.
    pub fn from_resource_id(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            ..Self::default()
        }
    }

    /// Set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the storage connection string.
    pub fn with_storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    /// Set the credential strategy.
    pub fn with_credential(mut self, credential: CredentialType) -> Self {
        self.credential = credential;
        self
    }

    /// Parse `%azure.connect` arguments. A leading positional argument is a
    /// resource id.
    pub fn from_arguments(args: &MagicArguments) -> AzureResult<Self> {
        let owned = |key: &str| args.get(key).map(str::to_string).filter(|v| !v.is_empty());
        let credential = match args.get("credential") {
            Some(raw) => raw
                .parse()
                .map_err(|e: qazure_hal::HalError| AzureClientError::AuthenticationFailed(e.to_string()))?,
            None => CredentialType::Default,
        };
        Ok(Self {
            resource_id: owned("resourceId").or_else(|| args.first().map(str::to_string)),
            subscription_id: owned("subscription"),
            resource_group: owned("resourceGroup"),
            workspace: owned("workspace"),
            storage: owned("storage"),
            location: owned("location"),
            credential,
        })
    }

    /// Whether nothing identifies a workspace.
    pub fn is_empty(&self) -> bool {
        self.resource_id.is_none()
            && self.subscription_id.is_none()
            && self.resource_group.is_none()
            && self.workspace.is_none()
    }

    /// Fill unset coordinates and location from workspace variables.
    pub fn fill_from_lookup(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        let read = |(current, legacy): (&str, &str)| {
            lookup(current)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| lookup(legacy).filter(|v| !v.trim().is_empty()))
        };
        if self.subscription_id.is_none() {
            self.subscription_id = read(SUBSCRIPTION_VARS);
        }
        if self.resource_group.is_none() {
            self.resource_group = read(RESOURCE_GROUP_VARS);
        }
        if self.workspace.is_none() {
            self.workspace = read(WORKSPACE_VARS);
        }
        if self.location.is_none() {
            self.location = read(LOCATION_VARS);
        }
    }

    /// Workspace coordinates, from the resource id when given.
    pub fn coordinates(&self) -> AzureResult<WorkspaceCoordinates> {
        if let Some(ref id) = self.resource_id {
            return parse_resource_id(id).ok_or_else(|| {
                AzureClientError::WorkspaceNotFound(format!(
                    "{id} is not a valid Azure Quantum workspace resource id"
                ))
            });
        }
        match (&self.subscription_id, &self.resource_group, &self.workspace) {
            (Some(s), Some(rg), Some(ws)) => Ok(WorkspaceCoordinates {
                subscription_id: s.clone(),
                resource_group: rg.clone(),
                workspace: ws.clone(),
            }),
            _ => {
                let missing = if self.credential == CredentialType::Environment {
                    AzureClientError::AuthenticationFailed(format!(
                        "{}, {} and {} must be set for the environment credential",
                        SUBSCRIPTION_VARS.0, RESOURCE_GROUP_VARS.0, WORKSPACE_VARS.0
                    ))
                } else {
                    AzureClientError::WorkspaceNotFound(
                        "subscription, resourceGroup and workspace are required".into(),
                    )
                };
                Err(missing)
            }
        }
    }
}
