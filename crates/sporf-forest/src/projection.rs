//! Sparse random projections used as candidate split directions.
//!
//! Every node draws a fresh [`ProjectionMatrix`]: `n_projections` sparse
//! linear combinations of the feature columns. The strategy that draws it is
//! resolved once per build (see [`crate::resolve`]) and cloned into every
//! tree task.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use rand::seq::index;
use rand_distr::StandardNormal;

use crate::catmap::CategoricalMap;
use crate::error::ForestError;
use crate::node::FeatureIndex;
use crate::rng::Substream;

/// How non-zero projection weights are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProjectionKind {
    /// Weights are +1 or -1 with equal probability.
    Binary,
    /// Weights are standard normal.
    Continuous,
    /// Each projection is a single feature with weight 1 (axis-aligned
    /// splits); `sparsity` is ignored.
    Axis,
}

/// Options passed to the projection strategy.
///
/// # Defaults ([`ProjectionOptions::for_features`])
///
/// | Parameter       | Default                  |
/// |-----------------|--------------------------|
/// | `n_projections` | `ceil(sqrt(n_features))` |
/// | `kind`          | `Binary`                 |
/// | `sparsity`      | `1 / n_features`         |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectionOptions {
    n_features: usize,
    n_projections: usize,
    kind: ProjectionKind,
    sparsity: f64,
    categorical_map: Option<CategoricalMap>,
}

impl ProjectionOptions {
    /// Create the default options for a matrix with `n_features` columns.
    #[must_use]
    pub fn for_features(n_features: usize) -> Self {
        let n_projections = ((n_features as f64).sqrt().ceil() as usize).max(1);
        Self {
            n_features,
            n_projections,
            kind: ProjectionKind::Binary,
            sparsity: 1.0 / n_features.max(1) as f64,
            categorical_map: None,
        }
    }

    /// Set the number of candidate projections drawn per node.
    #[must_use]
    pub fn with_n_projections(mut self, n_projections: usize) -> Self {
        self.n_projections = n_projections;
        self
    }

    /// Set how projection weights are drawn.
    #[must_use]
    pub fn with_kind(mut self, kind: ProjectionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the expected fraction of non-zero entries in the projection matrix.
    #[must_use]
    pub fn with_sparsity(mut self, sparsity: f64) -> Self {
        self.sparsity = sparsity;
        self
    }

    pub(crate) fn with_categorical_map(mut self, map: CategoricalMap) -> Self {
        self.categorical_map = Some(map);
        self
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of candidate projections per node.
    #[must_use]
    pub fn n_projections(&self) -> usize {
        self.n_projections
    }

    /// Return the weight distribution.
    #[must_use]
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    /// Return the expected fraction of non-zero entries.
    #[must_use]
    pub fn sparsity(&self) -> f64 {
        self.sparsity
    }

    /// Return the categorical grouping, when the categorical strategy was resolved.
    #[must_use]
    pub fn categorical_map(&self) -> Option<&CategoricalMap> {
        self.categorical_map.as_ref()
    }

    pub(crate) fn validate(&self, n_features: usize) -> Result<(), ForestError> {
        if self.n_features != n_features {
            return Err(ForestError::InvalidProjectionOptions {
                reason: format!(
                    "options are for {} features but the data has {n_features}",
                    self.n_features
                ),
            });
        }
        if self.n_projections == 0 {
            return Err(ForestError::InvalidProjectionOptions {
                reason: "n_projections must be at least 1".to_string(),
            });
        }
        if !(self.sparsity > 0.0 && self.sparsity <= 1.0) {
            return Err(ForestError::InvalidProjectionOptions {
                reason: format!("sparsity must be in (0.0, 1.0], got {}", self.sparsity),
            });
        }
        Ok(())
    }
}

/// One non-zero entry of a projection.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectionTerm {
    /// Feature column multiplied by `weight`.
    pub feature: FeatureIndex,
    /// Coefficient of the feature in the linear combination.
    pub weight: f64,
}

/// A sparse `n_features × n_projections` matrix, stored per projection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectionMatrix {
    projections: Vec<Vec<ProjectionTerm>>,
}

impl ProjectionMatrix {
    /// Create an all-zero matrix with `n_projections` columns.
    #[must_use]
    pub fn zeros(n_projections: usize) -> Self {
        Self {
            projections: vec![Vec::new(); n_projections],
        }
    }

    /// Add `weight` at (`feature`, `projection`).
    ///
    /// # Panics
    ///
    /// Panics if `projection >= n_projections`.
    pub fn push(&mut self, projection: usize, feature: FeatureIndex, weight: f64) {
        self.projections[projection].push(ProjectionTerm { feature, weight });
    }

    /// Return the number of projections (matrix columns).
    #[must_use]
    pub fn n_projections(&self) -> usize {
        self.projections.len()
    }

    /// Return the non-zero terms of one projection.
    #[must_use]
    pub fn terms(&self, projection: usize) -> &[ProjectionTerm] {
        &self.projections[projection]
    }

    /// Iterate over the projections in column order.
    pub fn iter(&self) -> impl Iterator<Item = &[ProjectionTerm]> {
        self.projections.iter().map(Vec::as_slice)
    }
}

/// A caller-supplied projection strategy.
pub trait ProjectionGenerator: fmt::Debug + Send + Sync {
    /// Draw the projection matrix for one node.
    fn generate(&self, options: &ProjectionOptions, rng: &mut Substream) -> ProjectionMatrix;
}

/// The projection strategy used by every node of every tree in a build.
#[derive(Debug, Clone)]
pub enum ProjectionStrategy {
    /// Sparse projections over all feature columns.
    Numeric,
    /// Sparse projections over numeric columns plus one slot per categorical
    /// group, using the map carried in the options.
    Categorical,
    /// A caller-supplied generator.
    Custom(Arc<dyn ProjectionGenerator>),
}

/// Which [`ProjectionStrategy`] variant a build resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StrategyKind {
    /// [`ProjectionStrategy::Numeric`]
    Numeric,
    /// [`ProjectionStrategy::Categorical`]
    Categorical,
    /// [`ProjectionStrategy::Custom`]
    Custom,
}

impl ProjectionStrategy {
    /// Return the variant tag.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            ProjectionStrategy::Numeric => StrategyKind::Numeric,
            ProjectionStrategy::Categorical => StrategyKind::Categorical,
            ProjectionStrategy::Custom(_) => StrategyKind::Custom,
        }
    }

    /// Draw the projection matrix for one node.
    pub fn generate(&self, options: &ProjectionOptions, rng: &mut Substream) -> ProjectionMatrix {
        match self {
            ProjectionStrategy::Numeric => numeric_projection(options, rng),
            ProjectionStrategy::Categorical => match options.categorical_map() {
                Some(map) => categorical_projection(options, map, rng),
                None => numeric_projection(options, rng),
            },
            ProjectionStrategy::Custom(generator) => generator.generate(options, rng),
        }
    }
}

fn draw_weight(kind: ProjectionKind, rng: &mut impl Rng) -> f64 {
    match kind {
        ProjectionKind::Binary => {
            if rng.r#gen::<bool>() {
                1.0
            } else {
                -1.0
            }
        }
        ProjectionKind::Continuous => rng.sample(StandardNormal),
        ProjectionKind::Axis => 1.0,
    }
}

/// Choose the non-zero (slot, projection) positions of a matrix with
/// `n_slots` rows, returned as `(slot, projection)` in column-major order.
fn draw_positions(
    n_slots: usize,
    options: &ProjectionOptions,
    rng: &mut impl Rng,
) -> Vec<(usize, usize)> {
    if options.kind() == ProjectionKind::Axis {
        let n = options.n_projections().min(n_slots);
        return index::sample(rng, n_slots, n)
            .into_iter()
            .enumerate()
            .map(|(projection, slot)| (slot, projection))
            .collect();
    }

    let cells = n_slots * options.n_projections();
    let nnz = ((cells as f64 * options.sparsity()).round() as usize).clamp(1, cells);
    let mut positions = index::sample(rng, cells, nnz).into_vec();
    positions.sort_unstable();
    positions
        .into_iter()
        .map(|cell| (cell % n_slots, cell / n_slots))
        .collect()
}

/// Sparse projection over every feature column.
pub(crate) fn numeric_projection(
    options: &ProjectionOptions,
    rng: &mut impl Rng,
) -> ProjectionMatrix {
    let positions = draw_positions(options.n_features(), options, rng);
    let mut matrix = ProjectionMatrix::zeros(options.n_projections());
    for (feature, projection) in positions {
        let weight = draw_weight(options.kind(), rng);
        matrix.push(projection, FeatureIndex::new(feature), weight);
    }
    matrix
}

/// Sparse projection over the effective features of a categorical map.
///
/// A slot that lands on a categorical group picks one of the group's
/// one-of-K columns uniformly, with weight 1.
pub(crate) fn categorical_projection(
    options: &ProjectionOptions,
    map: &CategoricalMap,
    rng: &mut impl Rng,
) -> ProjectionMatrix {
    let numeric = map.numeric_features();
    let positions = draw_positions(map.n_effective(), options, rng);
    let mut matrix = ProjectionMatrix::zeros(options.n_projections());
    for (slot, projection) in positions {
        if slot < numeric.len() {
            let weight = draw_weight(options.kind(), rng);
            matrix.push(projection, FeatureIndex::new(numeric[slot]), weight);
        } else {
            let group = &map.groups()[slot - numeric.len()];
            let column = group[rng.gen_range(0..group.len())];
            matrix.push(projection, FeatureIndex::new(column), 1.0);
        }
    }
    matrix
}
