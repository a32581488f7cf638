use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::classes::EquivalenceClass;
use crate::error::{Error, Result};

/// Metrics computed over an anonymized dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Average equivalence class size, normalized by k.
    Cavg,
    /// Classification metric over a sensitive attribute.
    Cm,
}

impl MetricKind {
    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Cavg => "C_avg",
            MetricKind::Cm => "CM",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Average equivalence class size normalized by the anonymity parameter `k`.
///
/// With suppression the anonymized row count is divided by `E * k`, otherwise
/// the original row count is, where `E` is the number of classes. A value of
/// 1.0 means classes are exactly `k` rows on average; larger values indicate
/// over-generalization.
pub fn average_equivalence_class_size(
    original_count: usize,
    anon_count: usize,
    equivalence_classes: &[EquivalenceClass],
    k: usize,
    suppression_applied: bool,
) -> Result<f64> {
    if k == 0 {
        return Err(Error::InvalidInput("k must be a positive integer".to_string()));
    }

    let class_count = equivalence_classes.len();
    if class_count == 0 {
        return Err(Error::InvalidInput(
            "average class size is undefined without equivalence classes".to_string(),
        ));
    }

    let rows = if suppression_applied {
        anon_count
    } else {
        original_count
    };

    Ok(rows as f64 / (class_count as f64 * k as f64))
}

/// Classification metric: share of rows that a majority-vote classifier over
/// each equivalence class would get wrong, with every suppressed row counted
/// as an error.
///
/// Values tied at the class maximum all count as correctly classified.
pub fn classification_metric<V>(
    original_count: usize,
    anon_count: usize,
    equivalence_classes: &[EquivalenceClass],
    sensitive_values_by_class: &[Vec<V>],
) -> Result<f64>
where
    V: Eq + Hash,
{
    if original_count == 0 {
        return Err(Error::InvalidInput(
            "classification metric is undefined for an empty original dataset".to_string(),
        ));
    }
    if anon_count > original_count {
        return Err(Error::InvalidInput(format!(
            "anonymized dataset has {anon_count} row(s), more than the original {original_count}"
        )));
    }
    if equivalence_classes.len() != sensitive_values_by_class.len() {
        return Err(Error::InvalidInput(format!(
            "{} equivalence class(es) but {} sensitive value group(s)",
            equivalence_classes.len(),
            sensitive_values_by_class.len()
        )));
    }

    let mut penalty = (original_count - anon_count) as u64;
    for (class_idx, (class, values)) in equivalence_classes
        .iter()
        .zip(sensitive_values_by_class)
        .enumerate()
    {
        if class.len() != values.len() {
            return Err(Error::InvalidInput(format!(
                "equivalence class {class_idx} has {} row(s) but {} sensitive value(s)",
                class.len(),
                values.len()
            )));
        }
        penalty += minority_count(values) as u64;
    }

    Ok(penalty as f64 / original_count as f64)
}

/// Rows whose value is not among the most frequent values of the group.
fn minority_count<V>(values: &[V]) -> usize
where
    V: Eq + Hash,
{
    let mut counts: HashMap<&V, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    let Some(max_count) = counts.values().copied().max() else {
        return 0;
    };

    counts.values().filter(|&&count| count < max_count).sum()
}
