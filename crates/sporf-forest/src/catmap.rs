//! Categorical grouping maps for one-of-K encoded feature columns.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Where a categorical map comes from.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CategoricalMapSource {
    /// A JSON file holding an array of column-index arrays, e.g. `[[3,4,5],[6,7]]`.
    Path(PathBuf),
    /// Groups supplied in memory, one `Vec` of zero-based column indices per
    /// original categorical feature.
    Groups(Vec<Vec<usize>>),
}

/// Why a categorical map source was rejected.
#[derive(Debug, thiserror::Error)]
pub enum CategoricalMapError {
    /// Returned when the map file cannot be read.
    #[error("cannot read categorical map {path}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the map file is not a JSON array of index arrays.
    #[error("cannot parse categorical map {path}")]
    Parse {
        /// Path to the map file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// Returned when the map contains no groups.
    #[error("categorical map has no groups")]
    NoGroups,

    /// Returned when a group lists no columns.
    #[error("categorical group {group} is empty")]
    EmptyGroup {
        /// Zero-based index of the empty group.
        group: usize,
    },

    /// Returned when a column index is outside the training matrix.
    #[error("column {column} in categorical group {group} is out of range for {n_features} features")]
    ColumnOutOfRange {
        /// Zero-based index of the offending group.
        group: usize,
        /// The out-of-range column index.
        column: usize,
        /// Number of feature columns in the training matrix.
        n_features: usize,
    },

    /// Returned when a column belongs to more than one group.
    #[error("column {column} appears in more than one categorical group")]
    DuplicateColumn {
        /// The repeated column index.
        column: usize,
    },
}

impl CategoricalMapSource {
    /// Read and validate the map against a matrix with `n_features` columns.
    ///
    /// # Errors
    ///
    /// Returns a [`CategoricalMapError`] describing the first problem found.
    pub fn load(&self, n_features: usize) -> Result<CategoricalMap, CategoricalMapError> {
        match self {
            CategoricalMapSource::Path(path) => {
                let groups = read_groups(path)?;
                CategoricalMap::from_groups(groups, n_features)
            }
            CategoricalMapSource::Groups(groups) => {
                CategoricalMap::from_groups(groups.clone(), n_features)
            }
        }
    }
}

fn read_groups(path: &Path) -> Result<Vec<Vec<usize>>, CategoricalMapError> {
    let text = std::fs::read_to_string(path).map_err(|e| CategoricalMapError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&text).map_err(|e| CategoricalMapError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// A validated grouping of one-of-K columns.
///
/// Columns outside every group are numeric features. Projections draw over
/// the effective feature set: each numeric column plus one slot per group.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CategoricalMap {
    groups: Vec<Vec<usize>>,
    numeric: Vec<usize>,
}

impl CategoricalMap {
    fn from_groups(
        groups: Vec<Vec<usize>>,
        n_features: usize,
    ) -> Result<Self, CategoricalMapError> {
        if groups.is_empty() {
            return Err(CategoricalMapError::NoGroups);
        }
        let mut owner: Vec<Option<usize>> = vec![None; n_features];
        for (group, columns) in groups.iter().enumerate() {
            if columns.is_empty() {
                return Err(CategoricalMapError::EmptyGroup { group });
            }
            for &column in columns {
                if column >= n_features {
                    return Err(CategoricalMapError::ColumnOutOfRange {
                        group,
                        column,
                        n_features,
                    });
                }
                if owner[column].replace(group).is_some() {
                    return Err(CategoricalMapError::DuplicateColumn { column });
                }
            }
        }
        let numeric: Vec<usize> = (0..n_features).filter(|&c| owner[c].is_none()).collect();

        debug!(
            n_groups = groups.len(),
            n_numeric = numeric.len(),
            "categorical map loaded"
        );

        Ok(Self { groups, numeric })
    }

    /// Return the column groups, one per original categorical feature.
    #[must_use]
    pub fn groups(&self) -> &[Vec<usize>] {
        &self.groups
    }

    /// Return the columns that belong to no group, in ascending order.
    #[must_use]
    pub fn numeric_features(&self) -> &[usize] {
        &self.numeric
    }

    /// Return the number of effective features (numeric columns + groups).
    #[must_use]
    pub fn n_effective(&self) -> usize {
        self.numeric.len() + self.groups.len()
    }
}
