//! Experiment plans, CSV loading and reports for anonymization metrics.

pub mod engine;
pub mod errors;
pub mod load;
pub mod model;
pub mod plan;
pub mod report;

pub use engine::EvaluationEngine;
pub use errors::EvalError;
pub use load::{load_dataset_csv, read_dataset_csv};
pub use model::{
    EvaluationReport, ExperimentOutcome, METRICS_VERSION, PerformanceMetrics, RawSummary,
};
pub use plan::{Experiment, ExperimentPlan, load_plan, plan_json_schema, validate_plan};
pub use report::{render_report, render_summary_lines};
