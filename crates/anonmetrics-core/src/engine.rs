use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classes::{
    EquivalenceClass, EquivalenceClassifier, GroupingClassifier, QuasiIdentifierSet,
    validate_partition,
};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::metrics::{self, MetricKind};

/// Which metrics to compute in a single pass over one anonymized dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricRequest<'a> {
    /// Compute C_avg with this anonymity parameter.
    pub k: Option<usize>,
    pub suppression_applied: bool,
    /// Compute CM with this column as the class label.
    pub sensitive_attribute: Option<&'a str>,
}

/// Metrics computed by [`MetricsEngine::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValues {
    pub equivalence_classes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cavg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cm: Option<f64>,
}

/// Computes utility metrics for an (original, anonymized) dataset pair.
#[derive(Debug, Clone, Default)]
pub struct MetricsEngine<C = GroupingClassifier> {
    classifier: C,
}

impl<C: EquivalenceClassifier> MetricsEngine<C> {
    pub fn new(classifier: C) -> Self {
        Self { classifier }
    }

    /// C_avg of `db_anon` for the anonymity parameter `k`.
    pub fn average_equivalence_class_size(
        &self,
        db: &Dataset,
        db_anon: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
        k: usize,
        suppression_applied: bool,
    ) -> Result<f64> {
        let classes = self.equivalence_classes(db_anon, quasi_identifiers)?;
        cavg_over(db, db_anon, &classes, k, suppression_applied)
    }

    /// CM of `db_anon` using `sensitive_attribute` as the class label.
    pub fn classification_metric(
        &self,
        db: &Dataset,
        db_anon: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
        sensitive_attribute: &str,
    ) -> Result<f64> {
        db_anon.column_index(sensitive_attribute)?;
        let classes = self.equivalence_classes(db_anon, quasi_identifiers)?;
        cm_over(db, db_anon, &classes, sensitive_attribute)
    }

    /// Classify `db_anon` once and compute every requested metric over the
    /// resulting classes.
    pub fn evaluate(
        &self,
        db: &Dataset,
        db_anon: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValues> {
        if let Some(sensitive_attribute) = request.sensitive_attribute {
            db_anon.column_index(sensitive_attribute)?;
        }
        let classes = self.equivalence_classes(db_anon, quasi_identifiers)?;

        let cavg = request
            .k
            .map(|k| cavg_over(db, db_anon, &classes, k, request.suppression_applied))
            .transpose()?;
        let cm = request
            .sensitive_attribute
            .map(|sensitive_attribute| cm_over(db, db_anon, &classes, sensitive_attribute))
            .transpose()?;

        Ok(MetricValues {
            equivalence_classes: classes.len(),
            cavg,
            cm,
        })
    }

    /// Classify `dataset` and check the result is a partition of its rows.
    pub fn equivalence_classes(
        &self,
        dataset: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
    ) -> Result<Vec<EquivalenceClass>> {
        quasi_identifiers.resolve(dataset)?;
        let classes = self.classifier.classify(dataset, quasi_identifiers)?;
        validate_partition(&classes, dataset.row_count())?;

        debug!(
            event = "equivalence_classes_built",
            rows = dataset.row_count(),
            classes = classes.len(),
            quasi_identifiers = quasi_identifiers.columns().len()
        );
        Ok(classes)
    }
}

fn cavg_over(
    db: &Dataset,
    db_anon: &Dataset,
    classes: &[EquivalenceClass],
    k: usize,
    suppression_applied: bool,
) -> Result<f64> {
    let value = metrics::average_equivalence_class_size(
        db.row_count(),
        db_anon.row_count(),
        classes,
        k,
        suppression_applied,
    )?;

    debug!(
        event = "metric_computed",
        metric = %MetricKind::Cavg,
        k = k,
        suppression = suppression_applied,
        value = value
    );
    Ok(value)
}

fn cm_over(
    db: &Dataset,
    db_anon: &Dataset,
    classes: &[EquivalenceClass],
    sensitive_attribute: &str,
) -> Result<f64> {
    let sensitive_values = classes
        .iter()
        .map(|class| db_anon.project(sensitive_attribute, class.rows()))
        .collect::<Result<Vec<_>>>()?;

    let value = metrics::classification_metric(
        db.row_count(),
        db_anon.row_count(),
        classes,
        &sensitive_values,
    )?;

    debug!(
        event = "metric_computed",
        metric = %MetricKind::Cm,
        sensitive_attribute = sensitive_attribute,
        value = value
    );
    Ok(value)
}
