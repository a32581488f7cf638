use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metrics contract version for `metrics.json`.
pub const METRICS_VERSION: &str = "0.1";

/// Machine-readable result of evaluating an experiment plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics_version: String,
    pub run_id: String,
    pub raw: RawSummary,
    pub quasi_identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_attribute: Option<String>,
    pub suppression: bool,
    /// Outcomes in plan order.
    pub results: Vec<ExperimentOutcome>,
    pub performance: PerformanceMetrics,
}

impl EvaluationReport {
    /// Outcomes keyed by experiment id.
    pub fn by_id(&self) -> BTreeMap<&str, &ExperimentOutcome> {
        self.results
            .iter()
            .map(|outcome| (outcome.id.as_str(), outcome))
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExperimentOutcome> {
        self.results.iter().filter(|outcome| outcome.error.is_some())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Reference metadata for the raw dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSummary {
    pub path: String,
    pub rows: usize,
}

/// Result of one experiment. `error` is set when any requested metric
/// could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub id: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equivalence_classes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cavg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

impl ExperimentOutcome {
    pub fn new(id: impl Into<String>, file: impl Into<String>, k: Option<usize>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            k,
            rows: None,
            equivalence_classes: None,
            cavg: None,
            cm: None,
            error: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Timings for the evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub load_ms: u128,
    pub evaluate_ms: u128,
    pub total_ms: u128,
}
