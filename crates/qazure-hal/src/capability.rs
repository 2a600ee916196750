//! Target capability levels.
//!
//! A capability describes which control-flow constructs a program may use and
//! still run on a target. Levels are totally ordered: a program compiled for a
//! lower level runs on every target supporting a higher one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HalError;

/// What a target can execute, from most to least restrictive.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TargetCapability {
    /// Straight-line gate sequences; measurements only at the end.
    BasicQuantumFunctionality,
    /// Mid-circuit measurement with classical branching on results.
    BasicMeasurementFeedback,
    /// Arbitrary classical computation interleaved with quantum operations.
    #[default]
    FullComputation,
}

impl TargetCapability {
    /// All levels, least permissive first.
    pub const ALL: [TargetCapability; 3] = [
        TargetCapability::BasicQuantumFunctionality,
        TargetCapability::BasicMeasurementFeedback,
        TargetCapability::FullComputation,
    ];

    /// Whether a program requiring `required` may run under this ceiling.
    pub fn allows(self, required: TargetCapability) -> bool {
        required <= self
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            TargetCapability::BasicQuantumFunctionality => "BasicQuantumFunctionality",
            TargetCapability::BasicMeasurementFeedback => "BasicMeasurementFeedback",
            TargetCapability::FullComputation => "FullComputation",
        }
    }
}

impl fmt::Display for TargetCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetCapability {
    type Err = HalError;

    /// Accepts the canonical names and the QIR profile names
    /// `BasicExecution` and `AdaptiveExecution`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("BasicExecution") {
            return Ok(TargetCapability::BasicQuantumFunctionality);
        }
        if s.eq_ignore_ascii_case("AdaptiveExecution") {
            return Ok(TargetCapability::BasicMeasurementFeedback);
        }
        TargetCapability::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| HalError::Configuration(format!("Unknown target capability: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_order() {
        use TargetCapability::*;
        assert!(BasicQuantumFunctionality < BasicMeasurementFeedback);
        assert!(BasicMeasurementFeedback < FullComputation);
        assert!(FullComputation.allows(BasicMeasurementFeedback));
        assert!(!BasicQuantumFunctionality.allows(BasicMeasurementFeedback));
        assert!(BasicMeasurementFeedback.allows(BasicMeasurementFeedback));
    }

    #[test]
    fn test_capability_parse() {
        assert_eq!(
            "basicmeasurementfeedback".parse::<TargetCapability>().unwrap(),
            TargetCapability::BasicMeasurementFeedback
        );
        assert!("Teleportation".parse::<TargetCapability>().is_err());
        assert_eq!(
            "AdaptiveExecution".parse::<TargetCapability>().unwrap(),
            TargetCapability::BasicMeasurementFeedback
        );
        assert_eq!(
            "basicexecution".parse::<TargetCapability>().unwrap(),
            TargetCapability::BasicQuantumFunctionality
        );
    }
}
