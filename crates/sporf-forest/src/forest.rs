//! Forest construction: validation, resolution, dispatch and assembly.

use tracing::{debug, info, instrument};

use crate::config::ForestConfig;
use crate::dispatch::{dispatch, resolve_workers};
use crate::error::ForestError;
use crate::label::Labels;
use crate::matrix::TrainingMatrix;
use crate::projection::{ProjectionOptions, StrategyKind};
use crate::resolve::{ResolvedProjection, resolve_projection};
use crate::rng::RngStreams;
use crate::stratify::class_index;
use crate::tree::{ObliqueTree, ObliqueTreeBuilder, TreeBuilder, TreeTask};

/// The projection strategy a forest was built with.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectionSummary {
    kind: StrategyKind,
    options: ProjectionOptions,
}

impl ProjectionSummary {
    /// Return which strategy variant was resolved.
    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Return the options the strategy was called with.
    #[must_use]
    pub fn options(&self) -> &ProjectionOptions {
        &self.options
    }
}

/// A built ensemble.
///
/// Tree `i` was produced by substream `i`. The label list maps class code
/// `k` to `labels[k - 1]`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Forest<T = ObliqueTree> {
    pub(crate) trees: Vec<T>,
    pub(crate) labels: Labels,
    pub(crate) config: ForestConfig,
    pub(crate) projection: ProjectionSummary,
    pub(crate) n_features: usize,
}

impl<T> Forest<T> {
    /// Return the trees in build order.
    #[must_use]
    pub fn trees(&self) -> &[T] {
        &self.trees
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the distinct class labels in code order.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Return the number of feature columns the forest was built on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the configuration the forest was built with.
    #[must_use]
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Return the resolved projection strategy.
    #[must_use]
    pub fn projection(&self) -> &ProjectionSummary {
        &self.projection
    }
}

/// Build a forest with the default [`ObliqueTreeBuilder`].
///
/// `features[sample_idx][feature_idx]`, row-major.
///
/// # Errors
///
/// See [`build_with`].
pub fn build(
    features: &[Vec<f64>],
    labels: impl Into<Labels>,
    config: &ForestConfig,
) -> Result<Forest, ForestError> {
    build_with(&ObliqueTreeBuilder, features, labels, config)
}

/// Build a forest with a caller-supplied [`TreeBuilder`].
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`ForestError::InvalidTreeCount`], [`ForestError::InvalidMinParent`], [`ForestError::InvalidMaxDepth`], [`ForestError::InvalidBagging`] | config out of range |
/// | [`ForestError::EmptyDataset`], [`ForestError::ZeroFeatures`], [`ForestError::FeatureCountMismatch`], [`ForestError::NonFiniteValue`] | malformed feature matrix |
/// | [`ForestError::LabelCountMismatch`] | `labels.len() != features.len()` |
/// | [`ForestError::InvalidLabelType`] | numeric labels contain NaN or ±∞ |
/// | [`ForestError::InvalidProjectionOptions`] | projection options do not fit the data |
/// | [`ForestError::ThreadPool`] | the worker pool cannot be created |
/// | any builder error | the first failing tree aborts the build |
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub fn build_with<B: TreeBuilder>(
    builder: &B,
    features: &[Vec<f64>],
    labels: impl Into<Labels>,
    config: &ForestConfig,
) -> Result<Forest<B::Tree>, ForestError> {
    config.validate()?;

    let x = TrainingMatrix::from_rows(features)?;
    let labels = labels.into();
    if labels.len() != x.n_samples() {
        return Err(ForestError::LabelCountMismatch {
            n_samples: x.n_samples(),
            n_labels: labels.len(),
        });
    }

    let (codes, classes, counts) = labels.encode()?.into_parts();
    let n_features = x.n_features();
    let x = if config.rank_transform {
        x.rank_transformed()
    } else {
        x
    };

    let options = config
        .projection_options
        .clone()
        .unwrap_or_else(|| ProjectionOptions::for_features(n_features));
    options.validate(n_features)?;
    let projection = resolve_projection(
        config.projection_generator(),
        config.categorical_map(),
        options,
    );

    let class_index = class_index(config.stratify, &codes, &counts);
    let streams = RngStreams::new(config.seed, config.n_trees);
    let workers = resolve_workers(config.num_cores, config.n_trees);

    info!(
        n_trees = config.n_trees,
        n_samples = x.n_samples(),
        n_features,
        n_classes = counts.n_classes(),
        workers,
        strategy = ?projection.kind(),
        "building forest"
    );

    let task = TreeTask {
        features: &x,
        codes: &codes,
        config,
        class_index: class_index.as_ref(),
        class_counts: &counts,
        projection: &projection,
    };
    let trees = dispatch(builder, &task, streams, workers, config.progress)?;

    debug!(n_trees_built = trees.len(), "tree building complete");

    let forest = assemble(trees, classes, config, &projection, n_features);
    info!(n_trees = forest.n_trees(), "forest build complete");
    Ok(forest)
}

/// Package ordered trees with the label list, frozen config and projection
/// summary.
fn assemble<T>(
    trees: Vec<T>,
    labels: Labels,
    config: &ForestConfig,
    projection: &ResolvedProjection,
    n_features: usize,
) -> Forest<T> {
    Forest {
        trees,
        labels,
        config: config.clone(),
        projection: ProjectionSummary {
            kind: projection.kind(),
            options: projection.options().clone(),
        },
        n_features,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::node::FeatureIndex;
    use crate::projection::{ProjectionGenerator, ProjectionMatrix};
    use crate::rng::Substream;

    /// Two well-separated classes on feature 0.
    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<&'static str>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..15 {
            features.push(vec![i as f64 * 0.1, 1.0]);
            labels.push("low");
        }
        for i in 0..15 {
            features.push(vec![10.0 + i as f64 * 0.1, 1.0]);
            labels.push("high");
        }
        (features, labels)
    }

    #[test]
    fn numeric_labels_scenario() {
        let features: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let config = ForestConfig::new(3).unwrap().with_num_cores(1);
        let forest = build(&features, vec![1.0, 1.0, 2.0, 2.0, 3.0], &config).unwrap();
        assert_eq!(forest.n_trees(), 3);
        assert_eq!(forest.labels(), &Labels::Numeric(vec![1.0, 2.0, 3.0]));
        assert_eq!(forest.n_classes(), 3);
        assert_eq!(forest.n_features(), 1);
    }

    #[test]
    fn categorical_labels_in_code_order() {
        let (features, labels) = make_separable_data();
        let config = ForestConfig::new(2).unwrap().with_num_cores(1);
        let forest = build(&features, labels, &config).unwrap();
        assert_eq!(
            forest.labels(),
            &Labels::Categorical(vec!["high".to_string(), "low".to_string()])
        );
        assert_eq!(forest.projection().kind(), StrategyKind::Numeric);
        assert_eq!(forest.config().n_trees(), 2);
    }

    #[test]
    fn label_count_mismatch() {
        let (features, _) = make_separable_data();
        let config = ForestConfig::new(2).unwrap();
        let err = build(&features, vec!["a", "b"], &config).unwrap_err();
        assert!(matches!(
            err,
            ForestError::LabelCountMismatch {
                n_samples: 30,
                n_labels: 2
            }
        ));
    }

    #[test]
    fn invalid_numeric_labels_rejected() {
        let features = vec![vec![1.0], vec![2.0]];
        let config = ForestConfig::new(2).unwrap();
        let err = build(&features, vec![1.0, f64::NAN], &config).unwrap_err();
        assert!(matches!(err, ForestError::InvalidLabelType { .. }));
    }

    #[test]
    fn invalid_config_rejected_before_data() {
        let config = ForestConfig::new(2).unwrap().with_bagging(1.5);
        let err = build(&[], Vec::<f64>::new(), &config).unwrap_err();
        assert!(matches!(err, ForestError::InvalidBagging { .. }));
    }

    #[test]
    fn projection_options_must_match_data() {
        let (features, labels) = make_separable_data();
        let config = ForestConfig::new(2)
            .unwrap()
            .with_projection_options(ProjectionOptions::for_features(5));
        let err = build(&features, labels, &config).unwrap_err();
        assert!(matches!(err, ForestError::InvalidProjectionOptions { .. }));
    }

    #[test]
    fn rank_transform_is_invariant_to_monotone_rescaling() {
        let (features, labels) = make_separable_data();
        let rescaled: Vec<Vec<f64>> = features
            .iter()
            .map(|row| row.iter().map(|v| v * 1000.0 + 7.0).collect())
            .collect();
        let config = ForestConfig::new(4)
            .unwrap()
            .with_rank_transform(true)
            .with_num_cores(1);
        let a = build(&features, labels.clone(), &config).unwrap();
        let b = build(&rescaled, labels, &config).unwrap();
        assert_eq!(a.trees(), b.trees());
    }

    #[derive(Debug)]
    struct OutOfRange;

    impl ProjectionGenerator for OutOfRange {
        fn generate(&self, options: &ProjectionOptions, _rng: &mut Substream) -> ProjectionMatrix {
            let mut matrix = ProjectionMatrix::zeros(options.n_projections());
            matrix.push(0, FeatureIndex::new(options.n_features()), 1.0);
            matrix
        }
    }

    #[test]
    fn custom_generator_used_and_checked() {
        let (features, labels) = make_separable_data();
        let config = ForestConfig::new(3)
            .unwrap()
            .with_num_cores(1)
            .with_projection_generator(Arc::new(OutOfRange));
        let err = build(&features, labels, &config).unwrap_err();
        assert!(matches!(err, ForestError::TreeBuild { tree: 0, .. }));
    }

    #[test]
    fn categorical_map_groups_resolve() {
        let features: Vec<Vec<f64>> = (0..20)
            .map(|i| {
                let hot = i % 2;
                vec![i as f64, hot as f64, (1 - hot) as f64]
            })
            .collect();
        let labels: Vec<&str> = (0..20).map(|i| if i % 2 == 0 { "e" } else { "o" }).collect();
        let config = ForestConfig::new(2)
            .unwrap()
            .with_num_cores(1)
            .with_categorical_map(crate::catmap::CategoricalMapSource::Groups(vec![vec![1, 2]]));
        let forest = build(&features, labels, &config).unwrap();
        assert_eq!(forest.projection().kind(), StrategyKind::Categorical);
        assert!(forest.projection().options().categorical_map().is_some());
    }
}
