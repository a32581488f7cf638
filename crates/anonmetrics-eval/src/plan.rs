use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anonmetrics_core::{MetricKind, QuasiIdentifierSet};
use schemars::JsonSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::{Deserialize, Serialize};

use crate::errors::EvalError;

/// A batch of anonymized files evaluated against one raw dataset.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExperimentPlan {
    /// Raw (original) dataset in CSV form.
    pub raw: PathBuf,
    /// Base directory for relative dataset paths. Defaults to the plan's
    /// own directory when loaded from disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    /// Columns whose joint value defines equivalence classes.
    pub quasi_identifiers: QuasiIdentifierSet,
    /// Label column for the classification metric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitive_attribute: Option<String>,
    /// Whether the anonymization removed records.
    #[serde(default = "default_suppression")]
    pub suppression: bool,
    pub experiments: Vec<Experiment>,
}

/// One anonymized file and the metrics to compute for it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Experiment {
    /// Identifier used in reports; defaults to the file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Anonymized dataset in CSV form.
    pub path: PathBuf,
    /// Anonymity parameter the file was produced with. Required for `cavg`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    #[serde(default = "default_metrics")]
    pub metrics: Vec<MetricKind>,
}

impl Experiment {
    pub fn id(&self) -> String {
        self.id.clone().unwrap_or_else(|| file_label(&self.path))
    }

    pub fn wants(&self, metric: MetricKind) -> bool {
        self.metrics.contains(&metric)
    }
}

fn default_suppression() -> bool {
    true
}

fn default_metrics() -> Vec<MetricKind> {
    vec![MetricKind::Cavg, MetricKind::Cm]
}

impl ExperimentPlan {
    pub fn from_toml_str(contents: &str) -> Result<Self, EvalError> {
        Ok(toml::from_str(contents)?)
    }

    /// Resolve a dataset path against `data_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.data_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn raw_path(&self) -> PathBuf {
        self.resolve(&self.raw)
    }
}

/// Load a plan from TOML (or JSON when the extension is `.json`) and
/// validate it.
pub fn load_plan(path: &Path) -> Result<ExperimentPlan, EvalError> {
    let contents = std::fs::read_to_string(path)?;
    let mut plan = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str::<ExperimentPlan>(&contents)?,
        _ => ExperimentPlan::from_toml_str(&contents)?,
    };

    if plan.data_dir.is_none() {
        plan.data_dir = path.parent().map(Path::to_path_buf);
    }

    validate_plan(&plan)?;
    Ok(plan)
}

/// Check the plan before any dataset is read.
pub fn validate_plan(plan: &ExperimentPlan) -> Result<(), EvalError> {
    if plan.experiments.is_empty() {
        return Err(EvalError::InvalidPlan("plan lists no experiments".to_string()));
    }

    if let Some(sensitive_attribute) = &plan.sensitive_attribute {
        if sensitive_attribute.trim().is_empty() {
            return Err(EvalError::InvalidPlan(
                "sensitive_attribute must not be empty".to_string(),
            ));
        }
    }

    let mut ids = HashSet::new();
    for (idx, experiment) in plan.experiments.iter().enumerate() {
        let id = experiment.id();
        let path = format!("experiments[{idx}]");

        if !ids.insert(id.clone()) {
            return Err(EvalError::InvalidPlan(format!(
                "{path}: duplicate experiment id '{id}'"
            )));
        }
        if experiment.metrics.is_empty() {
            return Err(EvalError::InvalidPlan(format!(
                "{path}: no metrics requested for '{id}'"
            )));
        }
        if experiment.wants(MetricKind::Cavg) {
            match experiment.k {
                Some(0) => {
                    return Err(EvalError::InvalidPlan(format!(
                        "{path}: k must be a positive integer"
                    )));
                }
                Some(_) => {}
                None => {
                    return Err(EvalError::InvalidPlan(format!(
                        "{path}: k is required to compute C_avg for '{id}'"
                    )));
                }
            }
        }
        if experiment.wants(MetricKind::Cm) && plan.sensitive_attribute.is_none() {
            return Err(EvalError::InvalidPlan(format!(
                "{path}: sensitive_attribute is required to compute CM for '{id}'"
            )));
        }
    }

    Ok(())
}

/// Emit the JSON Schema for experiment plans.
pub fn plan_json_schema() -> RootSchema {
    schema_for!(ExperimentPlan)
}

pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
raw = "adult.csv"
quasi_identifiers = ["age", "education", "sex"]
sensitive_attribute = "salary-class"

[[experiments]]
path = "adult_k2_new.csv"
k = 2
metrics = ["cavg"]

[[experiments]]
id = "l-diversity"
path = "adult_k5_l2_new.csv"
metrics = ["cm"]
"#;

    #[test]
    fn parses_plan_with_defaults() {
        let plan = ExperimentPlan::from_toml_str(PLAN).unwrap();
        assert!(plan.suppression);
        assert_eq!(plan.experiments.len(), 2);
        assert_eq!(plan.experiments[0].id(), "adult_k2_new.csv");
        assert_eq!(plan.experiments[1].id(), "l-diversity");
        assert!(plan.experiments[1].wants(MetricKind::Cm));
        assert!(!plan.experiments[1].wants(MetricKind::Cavg));
        validate_plan(&plan).unwrap();
    }

    #[test]
    fn metrics_default_to_both() {
        let plan = ExperimentPlan::from_toml_str(
            r#"
raw = "adult.csv"
quasi_identifiers = ["age"]
sensitive_attribute = "salary-class"
experiments = [{ path = "adult_k5_new.csv", k = 5 }]
"#,
        )
        .unwrap();
        assert_eq!(
            plan.experiments[0].metrics,
            vec![MetricKind::Cavg, MetricKind::Cm]
        );
    }

    #[test]
    fn cavg_requires_positive_k() {
        let mut plan = ExperimentPlan::from_toml_str(PLAN).unwrap();
        plan.experiments[0].k = None;
        assert!(matches!(validate_plan(&plan), Err(EvalError::InvalidPlan(_))));

        plan.experiments[0].k = Some(0);
        let err = validate_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn cm_requires_sensitive_attribute() {
        let mut plan = ExperimentPlan::from_toml_str(PLAN).unwrap();
        plan.sensitive_attribute = None;
        let err = validate_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("sensitive_attribute"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut plan = ExperimentPlan::from_toml_str(PLAN).unwrap();
        plan.experiments[1].id = Some("adult_k2_new.csv".to_string());
        let err = validate_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn rejects_empty_quasi_identifiers() {
        let contents = PLAN.replace(r#"["age", "education", "sex"]"#, "[]");
        assert!(ExperimentPlan::from_toml_str(&contents).is_err());
    }

    #[test]
    fn resolves_relative_paths_against_data_dir() {
        let mut plan = ExperimentPlan::from_toml_str(PLAN).unwrap();
        plan.data_dir = Some(PathBuf::from("/data"));
        assert_eq!(plan.raw_path(), PathBuf::from("/data/adult.csv"));
        assert_eq!(
            plan.resolve(Path::new("/abs/file.csv")),
            PathBuf::from("/abs/file.csv")
        );
    }

    #[test]
    fn schema_describes_experiments() {
        let schema = serde_json::to_value(plan_json_schema()).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("experiments").is_some());
        assert!(properties.get("quasi_identifiers").is_some());
    }
}
