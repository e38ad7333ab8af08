//! Configuration builder for forest construction.

use std::sync::Arc;

use crate::catmap::CategoricalMapSource;
use crate::error::ForestError;
use crate::forest::Forest;
use crate::label::Labels;
use crate::projection::{ProjectionGenerator, ProjectionOptions};

/// Configuration for building a forest.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods. The
/// config is never mutated during a build; the fitted [`Forest`] keeps a
/// copy.
///
/// # Defaults
///
/// | Parameter              | Default                                  |
/// |------------------------|------------------------------------------|
/// | `min_parent`           | 6                                        |
/// | `max_depth`            | `None` (unbounded)                       |
/// | `bagging`              | 0.2                                      |
/// | `replacement`          | `true`                                   |
/// | `stratify`             | `false`                                  |
/// | `projection_generator` | `None` (resolved from the categorical map) |
/// | `projection_options`   | `None` ([`ProjectionOptions::for_features`]) |
/// | `rank_transform`       | `false`                                  |
/// | `store_oob`            | `false`                                  |
/// | `store_ns`             | `false`                                  |
/// | `progress`             | `false`                                  |
/// | `rotate`               | `false`                                  |
/// | `num_cores`            | 0 (detected cores − 1)                   |
/// | `seed`                 | 1                                        |
/// | `categorical_map`      | `None`                                   |
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) min_parent: usize,
    pub(crate) max_depth: Option<usize>,
    pub(crate) bagging: f64,
    pub(crate) replacement: bool,
    pub(crate) stratify: bool,
    #[serde(skip)]
    pub(crate) projection_generator: Option<Arc<dyn ProjectionGenerator>>,
    pub(crate) projection_options: Option<ProjectionOptions>,
    pub(crate) rank_transform: bool,
    pub(crate) store_oob: bool,
    pub(crate) store_ns: bool,
    pub(crate) progress: bool,
    pub(crate) rotate: bool,
    pub(crate) num_cores: usize,
    pub(crate) seed: u64,
    pub(crate) categorical_map: Option<CategoricalMapSource>,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ForestError> {
        if n_trees == 0 {
            return Err(ForestError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            min_parent: 6,
            max_depth: None,
            bagging: 0.2,
            replacement: true,
            stratify: false,
            projection_generator: None,
            projection_options: None,
            rank_transform: false,
            store_oob: false,
            store_ns: false,
            progress: false,
            rotate: false,
            num_cores: 0,
            seed: 1,
            categorical_map: None,
        })
    }

    // --- Setters ---

    /// Set the minimum node size required to attempt a split.
    #[must_use]
    pub fn with_min_parent(mut self, min_parent: usize) -> Self {
        self.min_parent = min_parent;
        self
    }

    /// Set the maximum tree depth. `None` means unbounded.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the out-of-bag fraction used when sampling without replacement.
    #[must_use]
    pub fn with_bagging(mut self, bagging: f64) -> Self {
        self.bagging = bagging;
        self
    }

    /// Set whether each tree samples rows with replacement.
    #[must_use]
    pub fn with_replacement(mut self, replacement: bool) -> Self {
        self.replacement = replacement;
        self
    }

    /// Set whether sampling preserves per-class proportions.
    #[must_use]
    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    /// Use a caller-supplied projection generator. Takes precedence over
    /// any categorical map.
    #[must_use]
    pub fn with_projection_generator(mut self, generator: Arc<dyn ProjectionGenerator>) -> Self {
        self.projection_generator = Some(generator);
        self
    }

    /// Override the default projection options.
    #[must_use]
    pub fn with_projection_options(mut self, options: ProjectionOptions) -> Self {
        self.projection_options = Some(options);
        self
    }

    /// Set whether each feature is rank-transformed before training.
    #[must_use]
    pub fn with_rank_transform(mut self, rank_transform: bool) -> Self {
        self.rank_transform = rank_transform;
        self
    }

    /// Set whether trees keep their out-of-bag row indices.
    #[must_use]
    pub fn with_store_oob(mut self, store_oob: bool) -> Self {
        self.store_oob = store_oob;
        self
    }

    /// Set whether trees keep per-node sample counts.
    #[must_use]
    pub fn with_store_ns(mut self, store_ns: bool) -> Self {
        self.store_ns = store_ns;
        self
    }

    /// Set whether a progress event is logged per completed tree.
    #[must_use]
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Set whether each tree trains on a randomly rotated copy of the data.
    #[must_use]
    pub fn with_rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    /// Set the requested worker count. 0 means detected cores − 1.
    #[must_use]
    pub fn with_num_cores(mut self, num_cores: usize) -> Self {
        self.num_cores = num_cores;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the categorical map source.
    #[must_use]
    pub fn with_categorical_map(mut self, source: CategoricalMapSource) -> Self {
        self.categorical_map = Some(source);
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the minimum node size required to attempt a split.
    #[must_use]
    pub fn min_parent(&self) -> usize {
        self.min_parent
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the out-of-bag fraction used without replacement.
    #[must_use]
    pub fn bagging(&self) -> f64 {
        self.bagging
    }

    /// Return whether rows are sampled with replacement.
    #[must_use]
    pub fn replacement(&self) -> bool {
        self.replacement
    }

    /// Return whether sampling is stratified by class.
    #[must_use]
    pub fn stratify(&self) -> bool {
        self.stratify
    }

    /// Return the caller-supplied projection generator, if any.
    #[must_use]
    pub fn projection_generator(&self) -> Option<&Arc<dyn ProjectionGenerator>> {
        self.projection_generator.as_ref()
    }

    /// Return the projection option override, if any.
    #[must_use]
    pub fn projection_options(&self) -> Option<&ProjectionOptions> {
        self.projection_options.as_ref()
    }

    /// Return whether features are rank-transformed.
    #[must_use]
    pub fn rank_transform(&self) -> bool {
        self.rank_transform
    }

    /// Return whether out-of-bag indices are stored.
    #[must_use]
    pub fn store_oob(&self) -> bool {
        self.store_oob
    }

    /// Return whether per-node sample counts are stored.
    #[must_use]
    pub fn store_ns(&self) -> bool {
        self.store_ns
    }

    /// Return whether progress events are logged.
    #[must_use]
    pub fn progress(&self) -> bool {
        self.progress
    }

    /// Return whether each tree is trained on rotated data.
    #[must_use]
    pub fn rotate(&self) -> bool {
        self.rotate
    }

    /// Return the requested worker count.
    #[must_use]
    pub fn num_cores(&self) -> usize {
        self.num_cores
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the categorical map source, if any.
    #[must_use]
    pub fn categorical_map(&self) -> Option<&CategoricalMapSource> {
        self.categorical_map.as_ref()
    }

    pub(crate) fn validate(&self) -> Result<(), ForestError> {
        if self.n_trees == 0 {
            return Err(ForestError::InvalidTreeCount {
                n_trees: self.n_trees,
            });
        }
        if self.min_parent == 0 {
            return Err(ForestError::InvalidMinParent {
                min_parent: self.min_parent,
            });
        }
        if self.max_depth == Some(0) {
            return Err(ForestError::InvalidMaxDepth { max_depth: 0 });
        }
        if !(0.0..1.0).contains(&self.bagging) {
            return Err(ForestError::InvalidBagging {
                bagging: self.bagging,
            });
        }
        Ok(())
    }

    /// Build a forest on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]`, row-major.
    /// `labels`: one label per row, categorical or numeric.
    ///
    /// # Errors
    ///
    /// See [`crate::build`].
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: impl Into<Labels>,
    ) -> Result<Forest, ForestError> {
        crate::forest::build(features, labels, self)
    }
}
