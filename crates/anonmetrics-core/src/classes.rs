use std::collections::{HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// Ordered, duplicate-free list of quasi-identifier column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct QuasiIdentifierSet(Vec<String>);

impl QuasiIdentifierSet {
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(Error::InvalidInput(
                "at least one quasi-identifier column is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "quasi-identifier '{column}' listed more than once"
                )));
            }
        }

        Ok(Self(columns))
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    /// Resolve every column against the dataset header, failing on the first
    /// absent one.
    pub fn resolve(&self, dataset: &Dataset) -> Result<Vec<usize>> {
        self.0
            .iter()
            .map(|column| {
                dataset.column_index(column).map_err(|_| {
                    Error::Schema(format!("quasi-identifier '{column}' not found in dataset"))
                })
            })
            .collect()
    }
}

impl TryFrom<Vec<String>> for QuasiIdentifierSet {
    type Error = Error;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<QuasiIdentifierSet> for Vec<String> {
    fn from(set: QuasiIdentifierSet) -> Self {
        set.0
    }
}

/// Row indices of one equivalence class, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquivalenceClass {
    rows: Vec<usize>,
}

impl EquivalenceClass {
    pub fn new(mut rows: Vec<usize>) -> Self {
        rows.sort_unstable();
        Self { rows }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Partitions a dataset into equivalence classes over a quasi-identifier set.
pub trait EquivalenceClassifier: Send + Sync {
    fn classify(
        &self,
        dataset: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
    ) -> Result<Vec<EquivalenceClass>>;
}

/// Groups rows by the exact tuple of their quasi-identifier values.
///
/// Classes come back in the order their key first appears in the dataset.
/// Empty cells are an ordinary value and group together.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupingClassifier;

impl EquivalenceClassifier for GroupingClassifier {
    fn classify(
        &self,
        dataset: &Dataset,
        quasi_identifiers: &QuasiIdentifierSet,
    ) -> Result<Vec<EquivalenceClass>> {
        let indices = quasi_identifiers.resolve(dataset)?;

        let mut positions: HashMap<Vec<&str>, usize> = HashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for (row_idx, row) in dataset.rows().iter().enumerate() {
            let key = indices
                .iter()
                .map(|&idx| row[idx].as_str())
                .collect::<Vec<_>>();
            match positions.get(&key) {
                Some(&group) => groups[group].push(row_idx),
                None => {
                    positions.insert(key, groups.len());
                    groups.push(vec![row_idx]);
                }
            }
        }

        Ok(groups.into_iter().map(EquivalenceClass::new).collect())
    }
}

/// Check that `classes` is a partition of `0..row_count`: no empty class,
/// every index in range and covered exactly once.
pub fn validate_partition(classes: &[EquivalenceClass], row_count: usize) -> Result<()> {
    let mut covered = vec![false; row_count];
    let mut total = 0usize;

    for (class_idx, class) in classes.iter().enumerate() {
        if class.is_empty() {
            return Err(Error::InvalidInput(format!("equivalence class {class_idx} is empty")));
        }
        for &row in class.rows() {
            match covered.get_mut(row) {
                Some(seen) if *seen => {
                    return Err(Error::InvalidInput(format!(
                        "row {row} belongs to more than one equivalence class"
                    )));
                }
                Some(seen) => *seen = true,
                None => {
                    return Err(Error::InvalidInput(format!(
                        "row {row} out of range for {row_count} row(s)"
                    )));
                }
            }
            total += 1;
        }
    }

    if total != row_count {
        return Err(Error::InvalidInput(format!(
            "equivalence classes cover {total} of {row_count} row(s)"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(columns: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| row.iter().map(|v| v.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn quasi_identifiers_reject_duplicates_and_empty() {
        assert!(QuasiIdentifierSet::new(Vec::<String>::new()).is_err());
        assert!(QuasiIdentifierSet::new(["age", "sex", "age"]).is_err());
        let qi = QuasiIdentifierSet::new(["age", "sex"]).unwrap();
        assert_eq!(qi.columns(), ["age", "sex"]);
    }

    #[test]
    fn quasi_identifiers_deserialize_with_validation() {
        let qi: QuasiIdentifierSet = serde_json::from_str(r#"["age","zip"]"#).unwrap();
        assert_eq!(qi.columns().len(), 2);
        assert!(serde_json::from_str::<QuasiIdentifierSet>("[]").is_err());
    }

    #[test]
    fn groups_rows_by_quasi_identifier_tuple() {
        let data = dataset(
            &["age", "zip", "disease"],
            &[
                &["3*", "130**", "flu"],
                &["4*", "148**", "cancer"],
                &["3*", "130**", "hiv"],
                &["4*", "148**", "flu"],
                &["3*", "148**", "flu"],
            ],
        );
        let qi = QuasiIdentifierSet::new(["age", "zip"]).unwrap();

        let classes = GroupingClassifier.classify(&data, &qi).unwrap();
        let rows: Vec<&[usize]> = classes.iter().map(EquivalenceClass::rows).collect();
        assert_eq!(rows, vec![&[0, 2][..], &[1, 3][..], &[4][..]]);
        validate_partition(&classes, data.row_count()).unwrap();
    }

    #[test]
    fn empty_cells_form_their_own_group() {
        let data = dataset(&["age"], &[&[""], &["30"], &[""]]);
        let qi = QuasiIdentifierSet::new(["age"]).unwrap();

        let classes = GroupingClassifier.classify(&data, &qi).unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[0].rows(), &[0, 2]);
    }

    #[test]
    fn missing_quasi_identifier_is_schema_error() {
        let data = dataset(&["age"], &[&["30"]]);
        let qi = QuasiIdentifierSet::new(["age", "zip"]).unwrap();

        let err = GroupingClassifier.classify(&data, &qi).unwrap_err();
        assert!(matches!(err, Error::Schema(message) if message.contains("zip")));
    }

    #[test]
    fn partition_validation_rejects_overlap_and_gaps() {
        let overlapping = vec![
            EquivalenceClass::new(vec![0, 1]),
            EquivalenceClass::new(vec![1, 2]),
        ];
        assert!(validate_partition(&overlapping, 3).is_err());

        let gap = vec![EquivalenceClass::new(vec![0, 2])];
        assert!(validate_partition(&gap, 3).is_err());

        let out_of_range = vec![EquivalenceClass::new(vec![0, 1, 5])];
        assert!(validate_partition(&out_of_range, 3).is_err());

        let empty = vec![EquivalenceClass::new(vec![0, 1, 2]), EquivalenceClass::new(Vec::new())];
        assert!(validate_partition(&empty, 3).is_err());

        assert!(validate_partition(&[], 0).is_ok());
    }
}
