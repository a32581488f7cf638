use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anonmetrics_core::{
    Dataset, EquivalenceClassifier, GroupingClassifier, MetricKind, MetricRequest, MetricValues,
    MetricsEngine,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::errors::EvalError;
use crate::load::load_dataset_csv;
use crate::model::{
    EvaluationReport, ExperimentOutcome, METRICS_VERSION, PerformanceMetrics, RawSummary,
};
use crate::plan::{Experiment, ExperimentPlan, file_label};

/// Runs the experiments of a plan against its raw dataset.
#[derive(Debug, Clone, Default)]
pub struct EvaluationEngine<C = GroupingClassifier> {
    metrics: MetricsEngine<C>,
}

impl<C: EquivalenceClassifier> EvaluationEngine<C> {
    pub fn new(metrics: MetricsEngine<C>) -> Self {
        Self { metrics }
    }

    pub fn load_raw(&self, plan: &ExperimentPlan) -> Result<Dataset, EvalError> {
        let path = plan.raw_path();
        let raw = load_dataset_csv(&path)?;
        info!(event = "raw_loaded", path = %path.display(), rows = raw.row_count());
        Ok(raw)
    }

    /// Evaluate every experiment in order. Failures are recorded per
    /// experiment; only an unreadable raw dataset aborts the run.
    pub fn run(&self, plan: &ExperimentPlan, run_id: &str) -> Result<EvaluationReport, EvalError> {
        let total_start = Instant::now();
        let raw = self.load_raw(plan)?;
        let load_ms = total_start.elapsed().as_millis();

        let evaluate_start = Instant::now();
        let outcomes = plan
            .experiments
            .iter()
            .map(|experiment| self.run_experiment(plan, &raw, experiment))
            .collect();

        let performance = PerformanceMetrics {
            load_ms,
            evaluate_ms: evaluate_start.elapsed().as_millis(),
            total_ms: total_start.elapsed().as_millis(),
        };
        Ok(build_report(plan, run_id, &raw, outcomes, performance))
    }

    /// Evaluate one experiment; never fails, errors land in the outcome.
    pub fn run_experiment(
        &self,
        plan: &ExperimentPlan,
        raw: &Dataset,
        experiment: &Experiment,
    ) -> ExperimentOutcome {
        let start = Instant::now();
        let id = experiment.id();
        let mut outcome = ExperimentOutcome::new(&id, file_label(&experiment.path), experiment.k);

        info!(event = "experiment_started", id = %id);
        let path = plan.resolve(&experiment.path);
        match self.evaluate_file(plan, raw, experiment, &path) {
            Ok((rows, values)) => {
                outcome.rows = Some(rows);
                outcome.equivalence_classes = Some(values.equivalence_classes);
                outcome.cavg = values.cavg;
                outcome.cm = values.cm;
                info!(
                    event = "experiment_finished",
                    id = %id,
                    classes = values.equivalence_classes,
                    cavg = ?values.cavg,
                    cm = ?values.cm
                );
            }
            Err(err) => {
                warn!(event = "experiment_failed", id = %id, error = %err);
                outcome.error = Some(err.to_string());
            }
        }

        outcome.elapsed_ms = start.elapsed().as_millis();
        outcome
    }

    fn evaluate_file(
        &self,
        plan: &ExperimentPlan,
        raw: &Dataset,
        experiment: &Experiment,
        path: &Path,
    ) -> Result<(usize, MetricValues), EvalError> {
        let k = if experiment.wants(MetricKind::Cavg) {
            Some(experiment.k.ok_or_else(|| {
                EvalError::InvalidPlan(format!(
                    "k is required to compute C_avg for '{}'",
                    experiment.id()
                ))
            })?)
        } else {
            None
        };
        let sensitive_attribute = if experiment.wants(MetricKind::Cm) {
            Some(plan.sensitive_attribute.as_deref().ok_or_else(|| {
                EvalError::InvalidPlan("sensitive_attribute is required to compute CM".to_string())
            })?)
        } else {
            None
        };

        let anon = load_dataset_csv(path)?;
        let request = MetricRequest {
            k,
            suppression_applied: plan.suppression,
            sensitive_attribute,
        };
        let values = self
            .metrics
            .evaluate(raw, &anon, &plan.quasi_identifiers, &request)?;
        Ok((anon.row_count(), values))
    }
}

impl<C: EquivalenceClassifier + 'static> EvaluationEngine<C> {
    /// Evaluate experiments on blocking tasks with at most `jobs` running at
    /// once. Results keep plan order whatever order the tasks finish in.
    pub async fn run_with_jobs(
        self: Arc<Self>,
        plan: Arc<ExperimentPlan>,
        run_id: &str,
        jobs: usize,
    ) -> Result<EvaluationReport, EvalError> {
        if jobs == 0 {
            return Err(EvalError::InvalidPlan("jobs must be at least 1".to_string()));
        }

        let total_start = Instant::now();
        let raw = {
            let engine = Arc::clone(&self);
            let plan = Arc::clone(&plan);
            tokio::task::spawn_blocking(move || engine.load_raw(&plan))
                .await
                .map_err(|err| EvalError::Task(err.to_string()))??
        };
        let raw = Arc::new(raw);
        let load_ms = total_start.elapsed().as_millis();

        let evaluate_start = Instant::now();
        let permits = Arc::new(Semaphore::new(jobs));
        let mut tasks = JoinSet::new();
        for (idx, experiment) in plan.experiments.iter().cloned().enumerate() {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|err| EvalError::Task(err.to_string()))?;
            let engine = Arc::clone(&self);
            let plan = Arc::clone(&plan);
            let raw = Arc::clone(&raw);
            tasks.spawn_blocking(move || {
                let outcome = engine.run_experiment(&plan, &raw, &experiment);
                drop(permit);
                (idx, outcome)
            });
        }

        let mut outcomes: Vec<Option<ExperimentOutcome>> = vec![None; plan.experiments.len()];
        while let Some(joined) = tasks.join_next().await {
            let (idx, outcome) = joined.map_err(|err| EvalError::Task(err.to_string()))?;
            outcomes[idx] = Some(outcome);
        }

        let performance = PerformanceMetrics {
            load_ms,
            evaluate_ms: evaluate_start.elapsed().as_millis(),
            total_ms: total_start.elapsed().as_millis(),
        };
        Ok(build_report(
            &plan,
            run_id,
            &raw,
            outcomes.into_iter().flatten().collect(),
            performance,
        ))
    }
}

/// Assemble the report from outcomes already collected in plan order.
fn build_report(
    plan: &ExperimentPlan,
    run_id: &str,
    raw: &Dataset,
    outcomes: Vec<ExperimentOutcome>,
    performance: PerformanceMetrics,
) -> EvaluationReport {
    EvaluationReport {
        metrics_version: METRICS_VERSION.to_string(),
        run_id: run_id.to_string(),
        raw: RawSummary {
            path: plan.raw_path().display().to_string(),
            rows: raw.row_count(),
        },
        quasi_identifiers: plan.quasi_identifiers.columns().to_vec(),
        sensitive_attribute: plan.sensitive_attribute.clone(),
        suppression: plan.suppression,
        results: outcomes,
        performance,
    }
}
