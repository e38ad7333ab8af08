//! Domain types for sporf-io.

use sporf_forest::Labels;

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A labelled training table.
///
/// Produced by [`TrainingReader`](crate::TrainingReader). `features[i]` and
/// the `i`-th label describe the same CSV row.
#[derive(Debug)]
pub struct TrainingSet {
    label_column: String,
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    labels: Labels,
}

impl TrainingSet {
    pub(crate) fn new(
        label_column: String,
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        labels: Labels,
    ) -> Self {
        Self {
            label_column,
            feature_names,
            features,
            labels,
        }
    }

    /// Return the name of the label column.
    #[must_use]
    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Return the feature column names, in CSV order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix (row-major).
    #[must_use]
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Return the labels.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Split into the feature matrix and labels.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<f64>>, Labels) {
        (self.features, self.labels)
    }
}
