//! Job output decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};

/// Outcome probabilities keyed by result label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram(BTreeMap<String, f64>);

impl Histogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add probability mass to an outcome.
    pub fn insert(&mut self, outcome: impl Into<String>, probability: f64) {
        *self.0.entry(outcome.into()).or_insert(0.0) += probability;
    }

    /// Probability of an outcome, if present.
    pub fn get(&self, outcome: &str) -> Option<f64> {
        self.0.get(outcome).copied()
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no outcomes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate outcomes in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    /// Outcomes sorted by descending probability.
    pub fn sorted(&self) -> Vec<(&String, &f64)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| b.1.total_cmp(a.1));
        entries
    }

    /// Decode a histogram from job output JSON.
    ///
    /// Accepts the Microsoft results format, where `Histogram` is a flat array
    /// alternating labels and probabilities, and the provider format, where
    /// `histogram` is an object of label to probability.
    pub fn from_output(output: &serde_json::Value) -> HalResult<Self> {
        let mut histogram = Histogram::new();

        if let Some(flat) = output.get("Histogram").and_then(|v| v.as_array()) {
            if flat.len() % 2 != 0 {
                return Err(HalError::Backend(
                    "Histogram array has an odd number of entries".into(),
                ));
            }
            for pair in flat.chunks(2) {
                let label = match &pair[0] {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let probability = pair[1].as_f64().ok_or_else(|| {
                    HalError::Backend(format!("Non-numeric probability for outcome {label}"))
                })?;
                histogram.insert(label, probability);
            }
            return Ok(histogram);
        }

        if let Some(map) = output.get("histogram").and_then(|v| v.as_object()) {
            for (label, value) in map {
                let probability = value.as_f64().ok_or_else(|| {
                    HalError::Backend(format!("Non-numeric probability for outcome {label}"))
                })?;
                histogram.insert(label.clone(), probability);
            }
            return Ok(histogram);
        }

        Err(HalError::Backend(
            "Job output contains no histogram".into(),
        ))
    }
}

/// Downloaded output of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Job the output belongs to.
    pub job_id: String,
    /// Output format reported by the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Decoded histogram; `None` for outputs that carry none, such as
    /// resource estimates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Histogram>,
    /// Output document as returned by the service.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl JobOutput {
    /// Output with a histogram and no other content.
    pub fn with_histogram(job_id: impl Into<String>, format: Option<String>, histogram: Histogram) -> Self {
        Self {
            job_id: job_id.into(),
            format,
            histogram: Some(histogram),
            raw: serde_json::Value::Null,
        }
    }

    /// Decode an output document.
    ///
    /// A document without a histogram is kept as raw JSON; a malformed
    /// histogram is an error.
    pub fn decode(job_id: impl Into<String>, format: Option<String>, raw: serde_json::Value) -> HalResult<Self> {
        let histogram = if raw.get("Histogram").is_some() || raw.get("histogram").is_some() {
            Some(Histogram::from_output(&raw)?)
        } else {
            None
        };
        Ok(Self {
            job_id: job_id.into(),
            format,
            histogram,
            raw,
        })
    }
}
