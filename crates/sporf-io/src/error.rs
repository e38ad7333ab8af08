//! I/O error types for sporf-io.

use std::path::PathBuf;

/// Errors from file I/O, CSV parsing, and artifact serialization.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when the input file does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("CSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the CSV file.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when the CSV file contains a header but zero data rows.
    #[error("empty dataset (no data rows) in {path}")]
    EmptyDataset {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when a data row has a different number of columns than the header.
    #[error("inconsistent row length in {path}: row {row_index} has {got} columns, expected {expected}")]
    InconsistentRowLength {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Expected number of columns (from header).
        expected: usize,
        /// Actual number of columns in this row.
        got: usize,
    },

    /// Returned when a feature cell is NaN, Inf, or otherwise not a finite float.
    #[error("non-finite value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    NonFiniteValue {
        /// Path to the CSV file.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Header name of the offending column.
        column: String,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when the header holds no column besides the label column.
    #[error("no feature columns in {path}")]
    NoFeatureColumns {
        /// Path to the CSV file.
        path: PathBuf,
    },

    /// Returned when the requested label column is not in the header.
    #[error("label column \"{column}\" not found in {path}")]
    MissingLabelColumn {
        /// Path to the CSV file.
        path: PathBuf,
        /// The requested column name.
        column: String,
    },

    /// Returned when the experiment name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid experiment name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidExperimentName {
        /// The invalid name.
        name: String,
    },

    /// Returned when the output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an artifact cannot be encoded as JSON.
    #[error("cannot encode artifact for {path}")]
    SerializeArtifact {
        /// Path the artifact was meant for.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when a result file cannot be written.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
