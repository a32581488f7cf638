use std::io::Read;
use std::path::Path;

use anonmetrics_core::Dataset;
use tracing::debug;

use crate::errors::EvalError;

/// Load a headed CSV file into a [`Dataset`].
///
/// Headers and cells are trimmed of surrounding whitespace, so `" Male"` and
/// `"Male"` are the same quasi-identifier value and share an equivalence
/// class. Adult-style exports pad values after each comma; trimming keeps a
/// padded raw file comparable with an unpadded anonymized one.
pub fn load_dataset_csv(path: &Path) -> Result<Dataset, EvalError> {
    let file = std::fs::File::open(path)?;
    let dataset = read_dataset_csv(file).map_err(|err| match err {
        EvalError::InvalidDataset(message) => {
            EvalError::InvalidDataset(format!("{}: {message}", path.display()))
        }
        other => other,
    })?;

    debug!(
        event = "dataset_loaded",
        path = %path.display(),
        rows = dataset.row_count(),
        columns = dataset.columns().len()
    );
    Ok(dataset)
}

/// Parse CSV from any reader; the first record is the header. Trims like
/// [`load_dataset_csv`].
pub fn read_dataset_csv<R: Read>(reader: R) -> Result<Dataset, EvalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(EvalError::InvalidDataset("missing header row".to_string()));
    }

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;
        if record.len() != headers.len() {
            return Err(EvalError::InvalidDataset(format!(
                "row {} has {} value(s), expected {}",
                row_idx + 1,
                record.len(),
                headers.len()
            )));
        }
        rows.push(record.iter().map(|value| value.trim().to_string()).collect());
    }

    Dataset::new(headers, rows).map_err(EvalError::from)
}
