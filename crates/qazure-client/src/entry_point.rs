//! Entry-point generation.
//!
//! An [`EntryPointGenerator`] compiles a named operation for a capability
//! ceiling. [`ProgramCatalog`] is the file-backed generator: a YAML (or JSON)
//! list of precompiled QIR programs with their parameters and the capability
//! each requires.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use qazure_hal::TargetCapability;

/// Input format of generated entry points.
pub const QIR_INPUT_FORMAT: &str = "qir.v1";
/// Output format requested for generated entry points.
pub const RESULTS_OUTPUT_FORMAT: &str = "microsoft.quantum-results.v1";

/// Entry-point generation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryPointError {
    /// No program with that name exists.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The program needs more than the target offers.
    #[error("Operation {operation} requires {required}, but the target supports only {ceiling}")]
    CapabilityMismatch {
        /// Operation that was requested.
        operation: String,
        /// Capability the program needs.
        required: TargetCapability,
        /// Capability of the target.
        ceiling: TargetCapability,
    },

    /// The program could not be produced.
    #[error("Compilation failed: {0}")]
    Compilation(String),

    /// Arguments do not match the declared parameters.
    #[error("{0}")]
    InvalidArguments(String),
}

/// Program catalog loading failure.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("Failed to read program catalog {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The catalog is not valid YAML/JSON.
    #[error("Invalid program catalog: {0}")]
    Parse(#[from] serde_yaml_ng::Error),

    /// The catalog parses but is inconsistent.
    #[error("Invalid program catalog: {0}")]
    Invalid(String),
}

/// Declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPointParameter {
    /// Parameter name.
    pub name: String,
    /// Type name: `Int`, `Double`, `Bool`, `Pauli`, `Result` or `String`.
    #[serde(rename = "type", default = "default_parameter_type")]
    pub type_name: String,
}

fn default_parameter_type() -> String {
    "String".to_string()
}

impl EntryPointParameter {
    /// Convert a command-line value to the JSON value sent to the service.
    fn encode(&self, raw: &str) -> Result<serde_json::Value, EntryPointError> {
        let invalid = || {
            EntryPointError::InvalidArguments(format!(
                "The value {raw} provided for parameter {} is not a valid {}.",
                self.name, self.type_name
            ))
        };
        Ok(match self.type_name.to_ascii_lowercase().as_str() {
            "int" => serde_json::Value::from(raw.trim().parse::<i64>().map_err(|_| invalid())?),
            "double" => serde_json::Value::from(raw.trim().parse::<f64>().map_err(|_| invalid())?),
            "bool" => serde_json::Value::from(raw.trim().parse::<bool>().map_err(|_| invalid())?),
            _ => serde_json::Value::from(raw),
        })
    }
}

/// A compiled, submittable program.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryPoint {
    /// Fully qualified operation name.
    pub operation_name: String,
    /// Declared parameters, in order.
    pub parameters: Vec<EntryPointParameter>,
    /// Capability the program needs.
    pub required_capability: TargetCapability,
    /// QIR payload.
    pub qir: Vec<u8>,
    /// Format of `qir`.
    pub input_format: String,
    /// Output format to request.
    pub output_format: String,
}

impl EntryPoint {
    /// Name of the entry-point function inside the QIR payload.
    pub fn entry_point_name(&self) -> String {
        format!("ENTRYPOINT__{}", self.operation_name.replace('.', "__"))
    }

    /// Check that every declared parameter has a value and encode the
    /// values as the service's `arguments` array.
    pub fn encode_arguments(
        &self,
        arguments: &std::collections::BTreeMap<String, String>,
    ) -> Result<serde_json::Value, EntryPointError> {
        let missing: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| !arguments.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(EntryPointError::InvalidArguments(format!(
                "Missing value for parameter(s) {} of operation {}.",
                missing.join(", "),
                self.operation_name
            )));
        }

        let encoded = self
            .parameters
            .iter()
            .map(|p| {
                let raw = arguments.get(&p.name).map(String::as_str).unwrap_or_default();
                Ok(serde_json::json!({
                    "name": p.name,
                    "type": p.type_name,
                    "value": p.encode(raw)?,
                }))
            })
            .collect::<Result<Vec<_>, EntryPointError>>()?;
        Ok(serde_json::Value::Array(encoded))
    }
}

/// Compiles named operations for a capability ceiling.
pub trait EntryPointGenerator: Send + Sync {
    /// Entry point for `operation`, failing if it needs more than `ceiling`.
    fn generate(
        &self,
        operation: &str,
        ceiling: TargetCapability,
    ) -> Result<EntryPoint, EntryPointError>;
}

/// Where a catalog program's QIR comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramSource {
    /// QIR text inline in the catalog.
    Qir(String),
    /// Path of a QIR file, relative to the catalog file.
    QirFile(PathBuf),
}

/// One program of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    /// Fully qualified operation name.
    pub name: String,
    /// Capability the program needs.
    #[serde(default)]
    pub capability: TargetCapability,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<EntryPointParameter>,
    /// QIR payload.
    #[serde(flatten)]
    pub source: ProgramSource,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    operations: Vec<ProgramDefinition>,
}

/// File-backed [`EntryPointGenerator`].
#[derive(Debug, Clone, Default)]
pub struct ProgramCatalog {
    programs: Vec<ProgramDefinition>,
    base_dir: PathBuf,
}

impl ProgramCatalog {
    /// Catalog of the given programs; relative QIR paths resolve against the
    /// working directory.
    pub fn new(programs: Vec<ProgramDefinition>) -> Self {
        Self {
            programs,
            base_dir: PathBuf::from("."),
        }
    }

    /// Load a catalog file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut catalog = Self::from_yaml_str(&content)?;
        catalog.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(catalog)
    }

    /// Parse catalog YAML (JSON is accepted as well).
    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml_ng::from_str(content)?;
        let mut seen = rustc_hash::FxHashSet::default();
        for program in &file.operations {
            if !seen.insert(program.name.as_str()) {
                return Err(CatalogError::Invalid(format!(
                    "operation {} is defined more than once",
                    program.name
                )));
            }
        }
        Ok(Self::new(file.operations))
    }

    /// Add or replace a program.
    pub fn insert(&mut self, program: ProgramDefinition) {
        self.programs.retain(|p| p.name != program.name);
        self.programs.push(program);
    }

    /// Operation names, in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.iter().map(|p| p.name.as_str())
    }

    /// Look up by full name, then by unique short name (last `.` segment).
    fn find(&self, operation: &str) -> Option<&ProgramDefinition> {
        if let Some(p) = self.programs.iter().find(|p| p.name == operation) {
            return Some(p);
        }
        let mut short = self
            .programs
            .iter()
            .filter(|p| p.name.rsplit('.').next() == Some(operation));
        match (short.next(), short.next()) {
            (Some(p), None) => Some(p),
            _ => None,
        }
    }

    fn load_qir(&self, source: &ProgramSource) -> Result<Vec<u8>, EntryPointError> {
        match source {
            ProgramSource::Qir(text) => Ok(text.as_bytes().to_vec()),
            ProgramSource::QirFile(path) => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    self.base_dir.join(path)
                };
                std::fs::read(&path).map_err(|e| {
                    EntryPointError::Compilation(format!("cannot read {}: {e}", path.display()))
                })
            }
        }
    }
}

impl EntryPointGenerator for ProgramCatalog {
    fn generate(
        &self,
        operation: &str,
        ceiling: TargetCapability,
    ) -> Result<EntryPoint, EntryPointError> {
        let program = self
            .find(operation)
            .ok_or_else(|| EntryPointError::UnknownOperation(operation.to_string()))?;

        if !ceiling.allows(program.capability) {
            return Err(EntryPointError::CapabilityMismatch {
                operation: program.name.clone(),
                required: program.capability,
                ceiling,
            });
        }

        let qir = self.load_qir(&program.source)?;
        debug!(operation = %program.name, bytes = qir.len(), "generated entry point");
        Ok(EntryPoint {
            operation_name: program.name.clone(),
            parameters: program.parameters.clone(),
            required_capability: program.capability,
            qir,
            input_format: QIR_INPUT_FORMAT.to_string(),
            output_format: RESULTS_OUTPUT_FORMAT.to_string(),
        })
    }
}
