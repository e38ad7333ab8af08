//! Reproducible, parallel construction of sparse-projection oblique forests.
//!
//! A build encodes the labels once, resolves the projection strategy once,
//! derives one random substream per tree, then builds every tree on a
//! dedicated worker pool. Trees come back in task order, so a forest depends
//! only on the data, the seed and the config, never on the worker count.
//!
//! ```no_run
//! use sporf_forest::ForestConfig;
//!
//! let features = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![5.0, 6.0], vec![6.0, 5.0]];
//! let labels = vec!["a", "a", "b", "b"];
//! let forest = ForestConfig::new(10)?
//!     .with_min_parent(2)
//!     .with_seed(7)
//!     .fit(&features, labels)?;
//! assert_eq!(forest.n_trees(), 10);
//! # Ok::<(), sporf_forest::ForestError>(())
//! ```

mod catmap;
mod config;
mod dispatch;
mod error;
mod forest;
mod label;
mod matrix;
mod node;
mod projection;
mod resolve;
mod rng;
mod rotate;
mod serialize;
mod split;
mod stratify;
mod tree;

pub use catmap::{CategoricalMap, CategoricalMapError, CategoricalMapSource};
pub use config::ForestConfig;
pub use dispatch::resolve_workers;
pub use error::ForestError;
pub use forest::{Forest, ProjectionSummary, build, build_with};
pub use label::{ClassCode, ClassCounts, EncodedLabels, Labels};
pub use matrix::TrainingMatrix;
pub use node::{FeatureIndex, Node, NodeIndex};
pub use projection::{
    ProjectionGenerator, ProjectionKind, ProjectionMatrix, ProjectionOptions, ProjectionStrategy,
    ProjectionTerm, StrategyKind,
};
pub use resolve::ResolvedProjection;
pub use rng::{RngStreams, Substream};
pub use rotate::Rotation;
pub use stratify::ClassIndex;
pub use tree::{ObliqueTree, ObliqueTreeBuilder, TreeBuilder, TreeTask};
