//! Core contracts for anonymization quality metrics.
//!
//! This crate defines the dataset model, the equivalence-class boundary and
//! the two utility metrics (average equivalence class size and the
//! classification metric). It performs no I/O.

pub mod classes;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod metrics;

pub use classes::{
    EquivalenceClass, EquivalenceClassifier, GroupingClassifier, QuasiIdentifierSet,
    validate_partition,
};
pub use dataset::Dataset;
pub use engine::{MetricRequest, MetricValues, MetricsEngine};
pub use error::{Error, Result};
pub use metrics::{MetricKind, average_equivalence_class_size, classification_metric};
