//! Random orthonormal rotations applied per tree.

use rand::Rng;
use rand_distr::StandardNormal;

/// A random `dim × dim` orthonormal matrix, row-major.
///
/// A tree built with rotation trains on `X · R`; its split projections refer
/// to the rotated columns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rotation {
    dim: usize,
    values: Vec<f64>,
}

/// Columns shorter than this after orthogonalization are redrawn.
const MIN_NORM: f64 = 1e-10;

impl Rotation {
    /// Draw a rotation by Gram–Schmidt orthogonalization of standard normal
    /// columns.
    pub(crate) fn random(dim: usize, rng: &mut impl Rng) -> Self {
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(dim);
        while columns.len() < dim {
            let mut v: Vec<f64> = (0..dim).map(|_| rng.sample(StandardNormal)).collect();
            for q in &columns {
                let dot: f64 = v.iter().zip(q).map(|(a, b)| a * b).sum();
                for (vi, qi) in v.iter_mut().zip(q) {
                    *vi -= dot * qi;
                }
            }
            let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm < MIN_NORM {
                continue;
            }
            v.iter_mut().for_each(|x| *x /= norm);
            columns.push(v);
        }

        let mut values = vec![0.0; dim * dim];
        for (c, q) in columns.iter().enumerate() {
            for (r, &x) in q.iter().enumerate() {
                values[r * dim + c] = x;
            }
        }
        Self { dim, values }
    }

    /// Return the matrix dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Return the row-major entries.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Return the entry at (`row`, `col`).
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.dim + col]
    }
}
