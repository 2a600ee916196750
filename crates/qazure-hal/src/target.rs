//! Execution target model.
//!
//! Maps remote target ids of the form `<provider>.<name...>` to the provider
//! that runs them, the client package needed to talk to that provider, and
//! the highest [`TargetCapability`] its hardware supports.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::capability::TargetCapability;

/// Prefix shared by all provider client packages.
pub const PACKAGE_PREFIX: &str = "Microsoft.Quantum.Providers";

/// Quantum hardware/simulator providers known to this client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    /// IonQ trapped-ion systems.
    IonQ,
    /// Quantinuum trapped-ion systems.
    Quantinuum,
    /// Former name of Quantinuum (deprecated alias).
    Honeywell,
    /// Quantum Circuits, Inc.
    Qci,
    /// Microsoft first-party targets.
    Microsoft,
    /// In-memory provider of the mock environment.
    Mock,
    /// A provider this client does not recognise.
    Unknown(String),
}

impl Provider {
    /// Known providers, in display order.
    pub const KNOWN: [Provider; 6] = [
        Provider::IonQ,
        Provider::Quantinuum,
        Provider::Honeywell,
        Provider::Qci,
        Provider::Microsoft,
        Provider::Mock,
    ];

    /// Parse a provider prefix (case-insensitive).
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "ionq" => Provider::IonQ,
            "quantinuum" => Provider::Quantinuum,
            "honeywell" => Provider::Honeywell,
            "qci" => Provider::Qci,
            "microsoft" => Provider::Microsoft,
            "mock" => Provider::Mock,
            _ => Provider::Unknown(name.to_string()),
        }
    }

    /// Whether this is a recognised provider.
    pub fn is_known(&self) -> bool {
        !matches!(self, Provider::Unknown(_))
    }

    /// Lowercase id as used in target ids.
    pub fn id(&self) -> &str {
        match self {
            Provider::IonQ => "ionq",
            Provider::Quantinuum => "quantinuum",
            Provider::Honeywell => "honeywell",
            Provider::Qci => "qci",
            Provider::Microsoft => "microsoft",
            Provider::Mock => "mock",
            Provider::Unknown(name) => name,
        }
    }

    /// Client package needed to execute on this provider.
    ///
    /// `Honeywell` shares its package with `Quantinuum`; the package kept the
    /// older name. Unknown providers have no package.
    pub fn package_name(&self) -> Option<String> {
        let suffix = match self {
            Provider::IonQ => "IonQ",
            Provider::Quantinuum | Provider::Honeywell => "Honeywell",
            Provider::Qci => "QCI",
            Provider::Microsoft => "Core",
            Provider::Mock => "Mock",
            Provider::Unknown(_) => return None,
        };
        Some(format!("{PACKAGE_PREFIX}.{suffix}"))
    }

    /// Highest capability the provider's targets support.
    ///
    /// Unknown providers default to the most permissive level.
    pub fn max_capability(&self) -> TargetCapability {
        match self {
            Provider::IonQ => TargetCapability::BasicQuantumFunctionality,
            Provider::Quantinuum | Provider::Honeywell | Provider::Qci => {
                TargetCapability::BasicMeasurementFeedback
            }
            Provider::Microsoft | Provider::Mock | Provider::Unknown(_) => {
                TargetCapability::FullComputation
            }
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A remote execution target.
///
/// Derived purely from the target id; two instances with the same id are
/// equal regardless of how they were created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTarget {
    /// Full target id (e.g. `"ionq.simulator"`).
    pub target_id: String,
    /// Provider parsed from the id prefix.
    pub provider: Provider,
    /// Highest capability supported by this target.
    pub capability: TargetCapability,
    /// Client package required for submission.
    pub package_name: String,
}

impl ExecutionTarget {
    /// Create a target from its id.
    ///
    /// Returns `None` when the prefix before the first `.` is not a known
    /// provider; this is how unrecognised targets are filtered out of a
    /// workspace listing.
    pub fn create(target_id: &str) -> Option<Self> {
        let prefix = target_id.split('.').next().unwrap_or_default();
        let provider = Provider::parse(prefix);
        let package_name = provider.package_name()?;
        Some(Self {
            target_id: target_id.to_string(),
            capability: provider.max_capability(),
            provider,
            package_name,
        })
    }

    /// Whether a target id names a recognised provider.
    pub fn is_valid(target_id: &str) -> bool {
        Self::create(target_id).is_some()
    }
}

impl PartialEq for ExecutionTarget {
    fn eq(&self, other: &Self) -> bool {
        self.target_id == other.target_id
    }
}

impl Eq for ExecutionTarget {}

impl Hash for ExecutionTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target_id.hash(state);
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_id)
    }
}
