//! Validated, row-major training matrix.

use tracing::debug;

use crate::error::ForestError;

/// Dense `n_samples × n_features` matrix of finite values, stored row-major.
///
/// Read-only for the duration of a build and shared by every tree task.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingMatrix {
    n_samples: usize,
    n_features: usize,
    values: Vec<f64>,
}

impl TrainingMatrix {
    /// Validate row-major input and copy it into a contiguous matrix.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `rows` is empty |
    /// | [`ForestError::ZeroFeatures`] | rows have zero columns |
    /// | [`ForestError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`ForestError::NonFiniteValue`] | any value is NaN or infinite |
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ForestError> {
        if rows.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        let n_samples = rows.len();
        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(ForestError::ZeroFeatures);
        }

        let mut values = Vec::with_capacity(n_samples * n_features);
        for (sample_index, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(ForestError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    sample_index,
                });
            }
            for (feature_index, &val) in row.iter().enumerate() {
                if !val.is_finite() {
                    return Err(ForestError::NonFiniteValue {
                        sample_index,
                        feature_index,
                    });
                }
            }
            values.extend_from_slice(row);
        }

        Ok(Self {
            n_samples,
            n_features,
            values,
        })
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return one row.
    #[must_use]
    pub fn row(&self, sample: usize) -> &[f64] {
        let start = sample * self.n_features;
        &self.values[start..start + self.n_features]
    }

    /// Return a single value.
    #[must_use]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.values[sample * self.n_features + feature]
    }

    /// Replace every column by the ranks of its values.
    ///
    /// Ranks are 1-based; tied values share the average of their ranks.
    #[must_use]
    pub fn rank_transformed(&self) -> Self {
        let mut values = vec![0.0; self.values.len()];
        let mut order: Vec<usize> = Vec::with_capacity(self.n_samples);

        for feature in 0..self.n_features {
            order.clear();
            order.extend(0..self.n_samples);
            order.sort_by(|&a, &b| self.get(a, feature).total_cmp(&self.get(b, feature)));

            let mut i = 0;
            while i < order.len() {
                let value = self.get(order[i], feature);
                let mut j = i + 1;
                while j < order.len() && self.get(order[j], feature) == value {
                    j += 1;
                }
                // Ranks in the tie group are (i+1)..=j.
                let rank = (i + 1 + j) as f64 / 2.0;
                for &sample in &order[i..j] {
                    values[sample * self.n_features + feature] = rank;
                }
                i = j;
            }
        }

        debug!(
            n_samples = self.n_samples,
            n_features = self.n_features,
            "rank transform applied"
        );

        Self {
            n_samples: self.n_samples,
            n_features: self.n_features,
            values,
        }
    }

    /// Return `self · rhs` for a row-major `n_features × n_features` matrix.
    pub(crate) fn multiplied(&self, rhs: &[f64]) -> Self {
        let d = self.n_features;
        debug_assert_eq!(rhs.len(), d * d);
        let mut values = vec![0.0; self.values.len()];
        for sample in 0..self.n_samples {
            let row = self.row(sample);
            let out = &mut values[sample * d..(sample + 1) * d];
            for (k, &x) in row.iter().enumerate() {
                if x == 0.0 {
                    continue;
                }
                let rhs_row = &rhs[k * d..(k + 1) * d];
                for (o, &r) in out.iter_mut().zip(rhs_row) {
                    *o += x * r;
                }
            }
        }
        Self {
            n_samples: self.n_samples,
            n_features: d,
            values,
        }
    }
}
