use std::collections::HashMap;

use crate::error::{Error, Result};

/// In-memory tabular dataset: an ordered header plus rows of string cells.
///
/// Datasets are immutable once built, so a single instance can be shared
/// across threads while several metrics are computed over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    column_lookup: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset, rejecting duplicate column names and ragged rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let mut column_lookup = HashMap::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            if column_lookup.insert(name.clone(), idx).is_some() {
                return Err(Error::Schema(format!("duplicate column '{name}'")));
            }
        }

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::Schema(format!(
                    "row {} has {} value(s), expected {}",
                    row_idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
        }

        Ok(Self {
            columns,
            column_lookup,
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column in the header.
    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.column_lookup
            .get(column)
            .copied()
            .ok_or_else(|| Error::Schema(format!("column '{column}' not found in dataset")))
    }

    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|values| values.get(column))
            .map(String::as_str)
    }

    /// Values of `column` for the given rows, in the order the rows are listed.
    pub fn project(&self, column: &str, row_indices: &[usize]) -> Result<Vec<&str>> {
        let col_idx = self.column_index(column)?;
        row_indices
            .iter()
            .map(|&row| {
                self.value(row, col_idx).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "row index {row} out of range for {} row(s)",
                        self.row_count()
                    ))
                })
            })
            .collect()
    }
}
