//! CSV training-table reader with full input validation.

use std::path::{Path, PathBuf};

use sporf_forest::Labels;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::TrainingSet;

/// Reads a labelled training table from a CSV file.
///
/// Expected CSV format:
/// - Header row required; one column (chosen by name) holds the labels,
///   every other column is a numeric feature
/// - All rows must have the same number of columns
///
/// The label column is read as numeric when every cell parses as a finite
/// float, and as categorical strings otherwise.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::MissingLabelColumn`] | Label column not in the header |
/// | [`IoError::NoFeatureColumns`] | Only the label column, no feature columns |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN, Inf, or unparseable float |
pub struct TrainingReader {
    path: PathBuf,
    label_column: String,
}

impl TrainingReader {
    /// Create a new reader for the given CSV file and label column name.
    pub fn new(path: &Path, label_column: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            label_column: label_column.to_string(),
        }
    }

    /// Read and validate the CSV file, returning a [`TrainingSet`].
    #[instrument(skip(self), fields(path = %self.path.display(), label = %self.label_column))]
    pub fn read(&self) -> Result<TrainingSet, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets the InconsistentRowLength check below fire
        // instead of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();
        debug!(expected_cols, "read CSV header");

        let Some(label_index) = header.iter().position(|h| h == self.label_column) else {
            return Err(IoError::MissingLabelColumn {
                path: self.path.clone(),
                column: self.label_column.clone(),
            });
        };
        if expected_cols < 2 {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }

        let feature_columns: Vec<usize> = (0..expected_cols).filter(|&c| c != label_index).collect();
        let feature_names: Vec<String> = feature_columns
            .iter()
            .map(|&c| header[c].to_string())
            .collect();

        let mut features = Vec::new();
        let mut raw_labels = Vec::new();

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(feature_columns.len());
            for (&col, name) in feature_columns.iter().zip(&feature_names) {
                let raw = &record[col];
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column: name.clone(),
                        raw: raw.to_string(),
                    })?;
                row.push(value);
            }

            raw_labels.push(record[label_index].to_string());
            features.push(row);
        }

        if features.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        let labels = infer_labels(raw_labels);

        info!(
            n_samples = features.len(),
            n_features = feature_names.len(),
            numeric_labels = matches!(labels, Labels::Numeric(_)),
            "training set loaded"
        );

        Ok(TrainingSet::new(
            self.label_column.clone(),
            feature_names,
            features,
            labels,
        ))
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Numeric when every cell is a finite float, categorical otherwise.
fn infer_labels(raw: Vec<String>) -> Labels {
    let numeric: Option<Vec<f64>> = raw
        .iter()
        .map(|s| s.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    match numeric {
        Some(values) => Labels::Numeric(values),
        None => Labels::Categorical(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn read_categorical_labels() {
        let csv = "sepal,species,petal\n1.0,setosa,0.2\n2.0,virginica,1.5\n";
        let f = write_csv(csv);
        let ds = TrainingReader::new(f.path(), "species").read().unwrap();
        assert_eq!(ds.n_samples(), 2);
        assert_eq!(ds.feature_names(), &["sepal", "petal"]);
        assert_eq!(ds.features()[1], vec![2.0, 1.5]);
        assert_eq!(
            ds.labels(),
            &Labels::Categorical(vec!["setosa".into(), "virginica".into()])
        );
    }

    #[test]
    fn read_numeric_labels() {
        let csv = "x,class\n0.5,1\n0.7,2\n0.9,2\n";
        let f = write_csv(csv);
        let ds = TrainingReader::new(f.path(), "class").read().unwrap();
        assert_eq!(ds.labels(), &Labels::Numeric(vec![1.0, 2.0, 2.0]));
    }

    #[test]
    fn mixed_label_column_is_categorical() {
        let csv = "x,class\n0.5,1\n0.7,two\n";
        let f = write_csv(csv);
        let ds = TrainingReader::new(f.path(), "class").read().unwrap();
        assert_eq!(
            ds.labels(),
            &Labels::Categorical(vec!["1".into(), "two".into()])
        );
    }

    #[test]
    fn missing_label_column_error() {
        let csv = "x,y\n1.0,2.0\n";
        let f = write_csv(csv);
        let err = TrainingReader::new(f.path(), "class").read().unwrap_err();
        assert!(matches!(err, IoError::MissingLabelColumn { .. }));
    }

    #[test]
    fn no_feature_columns_error() {
        let csv = "class\na\nb\n";
        let f = write_csv(csv);
        let err = TrainingReader::new(f.path(), "class").read().unwrap_err();
        assert!(matches!(err, IoError::NoFeatureColumns { .. }));
    }

    #[test]
    fn empty_dataset_error() {
        let csv = "x,class\n";
        let f = write_csv(csv);
        let err = TrainingReader::new(f.path(), "class").read().unwrap_err();
        assert!(matches!(err, IoError::EmptyDataset { .. }));
    }

    #[test]
    fn inconsistent_row_length_error() {
        let csv = "x,y,class\n1.0,2.0,a\n3.0,b\n";
        let f = write_csv(csv);
        let err = TrainingReader::new(f.path(), "class").read().unwrap_err();
        assert!(matches!(
            err,
            IoError::InconsistentRowLength {
                row_index: 1,
                expected: 3,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn non_finite_value_error() {
        let csv = "x,class\nNaN,a\n";
        let f = write_csv(csv);
        let err = TrainingReader::new(f.path(), "class").read().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { ref column, .. } if column == "x"));
    }

    #[test]
    fn unparseable_value_error() {
        let csv = "x,class\nabc,a\n";
        let f = write_csv(csv);
        let err = TrainingReader::new(f.path(), "class").read().unwrap_err();
        assert!(matches!(err, IoError::NonFiniteValue { .. }));
    }

    #[test]
    fn missing_file_error() {
        let err = TrainingReader::new(Path::new("/nonexistent/train_abc123.csv"), "class")
            .read()
            .unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
