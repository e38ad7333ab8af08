//! Build regression tests for sporf-forest.
//!
//! These tests pin the end-to-end build contract: output shape, label
//! handling, reproducibility across worker counts and failure behaviour.

use std::path::PathBuf;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use sporf_forest::{
    CategoricalMapSource, ForestConfig, ForestError, Labels, Node, ProjectionKind,
    ProjectionOptions, StrategyKind, Substream, TreeBuilder, TreeTask, build, build_with,
    resolve_workers,
};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic classification dataset
// ---------------------------------------------------------------------------

/// Generate an `n_samples × n_features`, 3-class dataset.
///
/// Features 0-1 are informative (class * 3.0 + noise in [0, 0.5]), the rest
/// are noise in [0, 0.5]. Samples are assigned round-robin across classes.
fn make_classification(n_samples: usize, n_features: usize) -> (Vec<Vec<f64>>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let names = ["setosa", "versicolor", "virginica"];
    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % 3;
        labels.push(names[class].to_string());
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 2 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

// ---------------------------------------------------------------------------
// a) shape of a sequential build
// ---------------------------------------------------------------------------

#[test]
fn three_class_sequential_build() {
    let (features, labels) = make_classification(150, 4);
    let config = ForestConfig::new(10).unwrap().with_num_cores(1);
    let forest = build(&features, labels.clone(), &config).unwrap();

    assert_eq!(forest.n_trees(), 10);
    assert_eq!(forest.n_classes(), 3);
    assert_eq!(
        forest.labels(),
        &Labels::Categorical(vec![
            "setosa".to_string(),
            "versicolor".to_string(),
            "virginica".to_string()
        ])
    );

    let encoded = Labels::from(labels).encode().unwrap();
    assert_eq!(encoded.counts().cumulative(), &[50, 100, 150]);
    assert_eq!(encoded.counts().total(), 150);

    for tree in forest.trees() {
        assert!(tree.n_nodes() >= 1);
        assert_eq!(tree.n_features(), 4);
        assert_eq!(tree.n_classes(), 3);
    }
}

// ---------------------------------------------------------------------------
// b) numeric labels
// ---------------------------------------------------------------------------

#[test]
fn numeric_labels_encode_in_numeric_order() {
    let encoded = Labels::from(vec![1.0, 1.0, 2.0, 2.0, 3.0]).encode().unwrap();
    let codes: Vec<u32> = encoded.codes().iter().map(|c| c.get()).collect();
    assert_eq!(codes, vec![1, 1, 2, 2, 3]);
    assert_eq!(encoded.classes(), &Labels::Numeric(vec![1.0, 2.0, 3.0]));
    assert_eq!(encoded.counts().cumulative(), &[2, 4, 5]);
}

// ---------------------------------------------------------------------------
// c) unreadable categorical map degrades to numeric projections
// ---------------------------------------------------------------------------

#[test]
fn invalid_map_path_builds_numeric_forest() {
    let (features, labels) = make_classification(60, 4);
    let config = ForestConfig::new(4)
        .unwrap()
        .with_num_cores(1)
        .with_categorical_map(CategoricalMapSource::Path(PathBuf::from(
            "/nonexistent/sporf_catmap.json",
        )));
    let forest = build(&features, labels, &config).unwrap();
    assert_eq!(forest.n_trees(), 4);
    assert_eq!(forest.projection().kind(), StrategyKind::Numeric);
    assert!(forest.projection().options().categorical_map().is_none());
}

// ---------------------------------------------------------------------------
// d) reproducibility across worker counts
// ---------------------------------------------------------------------------

#[test]
fn identical_forest_for_any_worker_count() {
    let (features, labels) = make_classification(120, 6);
    let base = ForestConfig::new(12)
        .unwrap()
        .with_seed(2024)
        .with_store_oob(true)
        .with_store_ns(true);

    let reference = build(&features, labels.clone(), &base.clone().with_num_cores(1)).unwrap();
    for workers in [2, 4] {
        let forest =
            build(&features, labels.clone(), &base.clone().with_num_cores(workers)).unwrap();
        assert_eq!(forest.trees(), reference.trees(), "workers = {workers}");
        assert_eq!(forest.labels(), reference.labels());
    }
}

#[test]
fn identical_forest_with_rotation_and_stratification() {
    let (features, labels) = make_classification(90, 5);
    let base = ForestConfig::new(6)
        .unwrap()
        .with_seed(3)
        .with_rotate(true)
        .with_stratify(true)
        .with_replacement(false);
    let a = build(&features, labels.clone(), &base.clone().with_num_cores(1)).unwrap();
    let b = build(&features, labels, &base.with_num_cores(3)).unwrap();
    assert_eq!(a.trees(), b.trees());
    assert!(a.trees().iter().all(|t| t.rotation().is_some()));
}

#[test]
fn different_seeds_give_different_forests() {
    let (features, labels) = make_classification(90, 6);
    let a = build(
        &features,
        labels.clone(),
        &ForestConfig::new(5).unwrap().with_seed(1).with_num_cores(1),
    )
    .unwrap();
    let b = build(
        &features,
        labels,
        &ForestConfig::new(5).unwrap().with_seed(2).with_num_cores(1),
    )
    .unwrap();
    assert_ne!(a.trees(), b.trees());
}

// ---------------------------------------------------------------------------
// e) dispatcher contract with caller-supplied builders
// ---------------------------------------------------------------------------

/// Returns the index of the substream it was given.
struct TreeIndexBuilder;

impl TreeBuilder for TreeIndexBuilder {
    type Tree = usize;

    fn build_tree(&self, _task: &TreeTask<'_>, rng: &mut Substream) -> Result<usize, ForestError> {
        // Burn some draws so workers finish out of order.
        let spins = rng.gen_range(0..2000);
        let mut acc = 0u64;
        for _ in 0..spins {
            acc = acc.wrapping_add(rng.r#gen::<u64>());
        }
        std::hint::black_box(acc);
        Ok(rng.tree())
    }
}

#[test]
fn trees_ordered_by_task_index() {
    let (features, labels) = make_classification(30, 2);
    let config = ForestConfig::new(40).unwrap().with_num_cores(4);
    let forest = build_with(&TreeIndexBuilder, &features, labels, &config).unwrap();
    assert_eq!(forest.trees(), (0..40).collect::<Vec<_>>().as_slice());
}

/// Fails on every tree whose index is a multiple of 5, after the first.
struct FlakyBuilder;

impl TreeBuilder for FlakyBuilder {
    type Tree = ();

    fn build_tree(&self, _task: &TreeTask<'_>, rng: &mut Substream) -> Result<(), ForestError> {
        if rng.tree() > 0 && rng.tree() % 5 == 0 {
            return Err(ForestError::TreeBuild {
                tree: rng.tree(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

#[test]
fn failing_task_aborts_build() {
    let (features, labels) = make_classification(30, 2);
    for workers in [1, 4] {
        let config = ForestConfig::new(20).unwrap().with_num_cores(workers);
        let err = build_with(&FlakyBuilder, &features, labels.clone(), &config).unwrap_err();
        assert!(
            matches!(err, ForestError::TreeBuild { tree, .. } if tree % 5 == 0),
            "workers = {workers}: {err}"
        );
    }
}

/// Checks what the task exposes.
struct TaskInspector;

impl TreeBuilder for TaskInspector {
    type Tree = (usize, bool, usize);

    fn build_tree(
        &self,
        task: &TreeTask<'_>,
        _rng: &mut Substream,
    ) -> Result<Self::Tree, ForestError> {
        Ok((
            task.min_parent(),
            task.class_index().is_some(),
            task.class_counts().n_classes(),
        ))
    }
}

#[test]
fn task_carries_config_and_class_index() {
    let (features, labels) = make_classification(30, 2);
    let config = ForestConfig::new(2)
        .unwrap()
        .with_min_parent(3)
        .with_stratify(true)
        .with_num_cores(1);
    let forest = build_with(&TaskInspector, &features, labels.clone(), &config).unwrap();
    assert_eq!(forest.trees(), &[(3, true, 3), (3, true, 3)]);

    let unstratified = ForestConfig::new(1).unwrap().with_num_cores(1);
    let forest = build_with(&TaskInspector, &features, labels, &unstratified).unwrap();
    assert!(!forest.trees()[0].1);
}

// ---------------------------------------------------------------------------
// f) worker resolution
// ---------------------------------------------------------------------------

#[test]
fn worker_count_within_bounds() {
    for n_trees in [1, 2, 7, 100] {
        let w = resolve_workers(0, n_trees);
        assert!((1..=n_trees).contains(&w), "auto workers {w} for {n_trees} trees");
    }
    assert_eq!(resolve_workers(64, 5), 5);
    assert_eq!(resolve_workers(1, 5), 1);
}

// ---------------------------------------------------------------------------
// g) optional per-tree records
// ---------------------------------------------------------------------------

#[test]
fn oob_complements_bag_without_replacement() {
    let (features, labels) = make_classification(100, 3);
    let config = ForestConfig::new(5)
        .unwrap()
        .with_replacement(false)
        .with_bagging(0.3)
        .with_store_oob(true)
        .with_store_ns(true)
        .with_num_cores(1);
    let forest = build(&features, labels, &config).unwrap();
    for tree in forest.trees() {
        let oob = tree.oob_indices().unwrap();
        let in_bag = tree.node_sample_counts().unwrap()[0];
        assert_eq!(oob.len(), 30);
        assert_eq!(in_bag, 70);
        assert!(oob.iter().all(|&row| row < 100));
    }
}

#[test]
fn node_counts_present_only_when_requested() {
    let (features, labels) = make_classification(60, 3);
    let without = build(
        &features,
        labels.clone(),
        &ForestConfig::new(2).unwrap().with_num_cores(1),
    )
    .unwrap();
    assert!(without.trees().iter().all(|t| t.node_sample_counts().is_none()));

    let with = build(
        &features,
        labels,
        &ForestConfig::new(2).unwrap().with_num_cores(1).with_store_ns(true),
    )
    .unwrap();
    for tree in with.trees() {
        let counts = tree.node_sample_counts().unwrap();
        assert_eq!(counts.len(), tree.n_nodes());
        for (i, node) in tree.nodes().iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                assert_eq!(counts[left.index()] + counts[right.index()], counts[i]);
            }
        }
    }
}

#[test]
fn max_depth_respected_across_forest() {
    let (features, labels) = make_classification(150, 4);
    let config = ForestConfig::new(8)
        .unwrap()
        .with_min_parent(1)
        .with_max_depth(Some(2))
        .with_num_cores(2);
    let forest = build(&features, labels, &config).unwrap();
    assert!(forest.trees().iter().all(|t| t.depth() <= 2));
}

#[test]
fn unbounded_depth_chain_on_worker_threads() {
    // Alternating labels along one feature: every split peels off a single
    // row, so an unlimited tree is a chain as deep as the data.
    let n = 8000;
    let features: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
    let labels: Vec<f64> = (0..n).map(|i| (i % 2) as f64).collect();
    let config = ForestConfig::new(2)
        .unwrap()
        .with_min_parent(1)
        .with_replacement(false)
        .with_bagging(0.0)
        .with_projection_options(
            ProjectionOptions::for_features(1).with_kind(ProjectionKind::Axis),
        )
        .with_num_cores(2);
    let forest = build(&features, labels, &config).unwrap();

    for tree in forest.trees() {
        assert_eq!(tree.n_leaves(), n);
        assert_eq!(tree.n_nodes(), 2 * n - 1);
        assert_eq!(tree.depth(), n - 1);
        // Pre-order layout: a split's left child directly follows it.
        for (i, node) in tree.nodes().iter().enumerate() {
            if let Node::Split { left, .. } = node {
                assert_eq!(left.index(), i + 1);
            }
        }
    }
}
