use std::path::PathBuf;

/// Errors from forest construction and model persistence.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when min_parent is zero.
    #[error("min_parent must be at least 1, got {min_parent}")]
    InvalidMinParent {
        /// The invalid min_parent value provided.
        min_parent: usize,
    },

    /// Returned when max_depth is `Some(0)`.
    #[error("max_depth must be at least 1 when set, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when bagging is not in [0.0, 1.0).
    #[error("bagging must be in [0.0, 1.0), got {bagging}")]
    InvalidBagging {
        /// The invalid bagging fraction provided.
        bagging: f64,
    },

    /// Returned when the projection options cannot be applied to the data.
    #[error("invalid projection options: {reason}")]
    InvalidProjectionOptions {
        /// Human-readable description of the offending option.
        reason: String,
    },

    /// Returned when the label vector is neither a usable categorical nor
    /// numeric sequence.
    #[error("invalid label type: {reason}")]
    InvalidLabelType {
        /// Human-readable description of why the labels were rejected.
        reason: String,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when the label vector length differs from the number of rows.
    #[error("got {n_labels} labels for {n_samples} samples")]
    LabelCountMismatch {
        /// Number of rows in the training matrix.
        n_samples: usize,
        /// Number of labels supplied.
        n_labels: usize,
    },

    /// Returned when a tree-building task fails. Aborts the whole build.
    #[error("building tree {tree} failed: {reason}")]
    TreeBuild {
        /// Zero-based index of the failing tree.
        tree: usize,
        /// Human-readable failure description.
        reason: String,
    },

    /// Returned when the worker pool cannot be created.
    #[error("failed to create worker pool with {workers} threads")]
    ThreadPool {
        /// Requested worker count.
        workers: usize,
        /// The underlying rayon error.
        source: rayon::ThreadPoolBuildError,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
