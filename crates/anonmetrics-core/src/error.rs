use thiserror::Error;

/// Core error type shared across anonmetrics crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A numeric or structural precondition of a metric was violated.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A named column is absent from the dataset, or the dataset shape is broken.
    #[error("schema error: {0}")]
    Schema(String),
}

/// Convenience alias for results returned by anonmetrics crates.
pub type Result<T> = std::result::Result<T, Error>;
