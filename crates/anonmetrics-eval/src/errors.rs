use thiserror::Error;

/// Errors emitted by the evaluation layer.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Core(#[from] anonmetrics_core::Error),
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("task failed: {0}")]
    Task(String),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
