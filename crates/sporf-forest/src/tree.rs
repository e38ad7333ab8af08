use std::borrow::Cow;
use std::collections::VecDeque;

use rand::Rng;
use rand::seq::index;
use tracing::{debug, instrument};

use crate::config::ForestConfig;
use crate::error::ForestError;
use crate::label::{ClassCode, ClassCounts};
use crate::matrix::TrainingMatrix;
use crate::node::{Node, NodeIndex};
use crate::resolve::ResolvedProjection;
use crate::rng::Substream;
use crate::rotate::Rotation;
use crate::split::find_best_split;
use crate::stratify::ClassIndex;

/// Everything a tree-building task reads. Shared read-only by all tasks.
#[derive(Debug, Clone, Copy)]
pub struct TreeTask<'a> {
    pub(crate) features: &'a TrainingMatrix,
    pub(crate) codes: &'a [ClassCode],
    pub(crate) config: &'a ForestConfig,
    pub(crate) class_index: Option<&'a ClassIndex>,
    pub(crate) class_counts: &'a ClassCounts,
    pub(crate) projection: &'a ResolvedProjection,
}

impl<'a> TreeTask<'a> {
    /// Return the (possibly rank-transformed) training matrix.
    #[must_use]
    pub fn features(&self) -> &'a TrainingMatrix {
        self.features
    }

    /// Return the encoded labels, one per row.
    #[must_use]
    pub fn codes(&self) -> &'a [ClassCode] {
        self.codes
    }

    /// Return the per-class row indices, present only when stratifying.
    #[must_use]
    pub fn class_index(&self) -> Option<&'a ClassIndex> {
        self.class_index
    }

    /// Return the cumulative class counts.
    #[must_use]
    pub fn class_counts(&self) -> &'a ClassCounts {
        self.class_counts
    }

    /// Return the resolved projection strategy and its options.
    #[must_use]
    pub fn projection(&self) -> &'a ResolvedProjection {
        self.projection
    }

    /// Return the minimum node size required to attempt a split.
    #[must_use]
    pub fn min_parent(&self) -> usize {
        self.config.min_parent
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.config.max_depth
    }

    /// Return the out-of-bag fraction used without replacement.
    #[must_use]
    pub fn bagging(&self) -> f64 {
        self.config.bagging
    }

    /// Return whether rows are sampled with replacement.
    #[must_use]
    pub fn replacement(&self) -> bool {
        self.config.replacement
    }

    /// Return whether sampling is stratified by class.
    #[must_use]
    pub fn stratify(&self) -> bool {
        self.config.stratify
    }

    /// Return whether out-of-bag indices are stored.
    #[must_use]
    pub fn store_oob(&self) -> bool {
        self.config.store_oob
    }

    /// Return whether per-node sample counts are stored.
    #[must_use]
    pub fn store_ns(&self) -> bool {
        self.config.store_ns
    }

    /// Return whether progress events are logged.
    #[must_use]
    pub fn progress(&self) -> bool {
        self.config.progress
    }

    /// Return whether each tree is trained on rotated data.
    #[must_use]
    pub fn rotate(&self) -> bool {
        self.config.rotate
    }
}

/// Builds one tree from a task and its private random substream.
///
/// Implementations must draw randomness only from `rng` so that forests are
/// reproducible regardless of worker count.
pub trait TreeBuilder: Sync {
    /// The fitted tree type.
    type Tree: Send;

    /// Build a single tree.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole forest build.
    fn build_tree(&self, task: &TreeTask<'_>, rng: &mut Substream)
    -> Result<Self::Tree, ForestError>;
}

/// The default builder: sparse oblique splits scored by Gini decrease.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObliqueTreeBuilder;

impl TreeBuilder for ObliqueTreeBuilder {
    type Tree = ObliqueTree;

    #[instrument(skip_all, fields(tree = rng.tree()))]
    fn build_tree(
        &self,
        task: &TreeTask<'_>,
        rng: &mut Substream,
    ) -> Result<ObliqueTree, ForestError> {
        let n_samples = task.features.n_samples();
        let n_features = task.features.n_features();
        let n_classes = task.class_counts.n_classes();

        let (x, rotation) = if task.rotate() {
            let rotation = Rotation::random(n_features, rng);
            let rotated = task.features.multiplied(rotation.values());
            (Cow::Owned(rotated), Some(rotation))
        } else {
            (Cow::Borrowed(task.features), None)
        };

        let mut in_bag = bootstrap(task, rng);
        let oob_indices = task.store_oob().then(|| out_of_bag(&in_bag, n_samples));

        let mut grower = Grower {
            x: &x,
            codes: task.codes,
            n_classes,
            min_parent: task.min_parent(),
            max_depth: task.max_depth(),
            projection: task.projection,
            tree: rng.tree(),
            nodes: Vec::new(),
            node_sample_counts: task.store_ns().then(Vec::new),
        };
        grower.grow(&mut in_bag, rng)?;

        debug!(
            n_in_bag = in_bag.len(),
            n_nodes = grower.nodes.len(),
            "oblique tree built"
        );

        Ok(ObliqueTree {
            nodes: grower.nodes,
            node_sample_counts: grower.node_sample_counts,
            oob_indices,
            rotation,
            n_features,
            n_classes,
        })
    }
}

/// Draw the in-bag rows for one tree.
fn bootstrap(task: &TreeTask<'_>, rng: &mut Substream) -> Vec<usize> {
    let n_samples = task.features.n_samples();
    let draw = |rows: &[usize], rng: &mut Substream, out: &mut Vec<usize>| {
        let size = rows.len();
        if task.replacement() {
            out.extend((0..size).map(|_| rows[rng.gen_range(0..size)]));
        } else {
            let n_out = (size as f64 * task.bagging()).floor() as usize;
            let mut picked: Vec<usize> = index::sample(rng, size, size - n_out)
                .into_iter()
                .map(|i| rows[i])
                .collect();
            picked.sort_unstable();
            out.extend(picked);
        }
    };

    let mut in_bag = Vec::with_capacity(n_samples);
    match task.class_index {
        Some(class_index) => {
            for (_, rows) in class_index.iter() {
                if !rows.is_empty() {
                    draw(rows, &mut *rng, &mut in_bag);
                }
            }
        }
        None => {
            let rows: Vec<usize> = (0..n_samples).collect();
            draw(&rows, &mut *rng, &mut in_bag);
        }
    }
    in_bag
}

/// Rows never drawn into the bag, ascending.
fn out_of_bag(in_bag: &[usize], n_samples: usize) -> Vec<usize> {
    let mut drawn = vec![false; n_samples];
    for &row in in_bag {
        drawn[row] = true;
    }
    (0..n_samples).filter(|&row| !drawn[row]).collect()
}

/// Majority class, ties resolved to the smallest code.
fn majority(class_counts: &[usize]) -> ClassCode {
    let mut best = 0;
    for (k, &count) in class_counts.iter().enumerate() {
        if count > class_counts[best] {
            best = k;
        }
    }
    ClassCode::from_index(best)
}

struct Grower<'a> {
    x: &'a TrainingMatrix,
    codes: &'a [ClassCode],
    n_classes: usize,
    min_parent: usize,
    max_depth: Option<usize>,
    projection: &'a ResolvedProjection,
    tree: usize,
    nodes: Vec<Node>,
    node_sample_counts: Option<Vec<usize>>,
}

/// A pending node: its slice of the in-bag buffer, its depth, and the split
/// node that links to it.
struct Pending {
    start: usize,
    end: usize,
    depth: usize,
    parent: Option<(usize, Side)>,
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Grower<'_> {
    /// Grow the arena depth-first from an explicit stack.
    ///
    /// Each node owns a contiguous range of `samples`; a split partitions its
    /// range in place so the children own the two halves. Nodes are laid out
    /// in pre-order (node, left subtree, right subtree) with the root at 0.
    fn grow(&mut self, samples: &mut [usize], rng: &mut Substream) -> Result<(), ForestError> {
        let mut stack = vec![Pending {
            start: 0,
            end: samples.len(),
            depth: 0,
            parent: None,
        }];

        while let Some(pending) = stack.pop() {
            let node = &mut samples[pending.start..pending.end];
            let (idx, split) = self.visit(node, pending.depth, rng)?;

            if let Some((parent, side)) = pending.parent {
                if let Node::Split { left, right, .. } = &mut self.nodes[parent] {
                    match side {
                        Side::Left => *left = idx,
                        Side::Right => *right = idx,
                    }
                }
            }

            if let Some(n_left) = split {
                let mid = pending.start + n_left;
                let depth = pending.depth + 1;
                let parent = idx.index();
                // Right first so the left subtree is grown next.
                stack.push(Pending {
                    start: mid,
                    end: pending.end,
                    depth,
                    parent: Some((parent, Side::Right)),
                });
                stack.push(Pending {
                    start: pending.start,
                    end: mid,
                    depth,
                    parent: Some((parent, Side::Left)),
                });
            }
        }
        Ok(())
    }

    /// Push the node for `samples`. Returns its index and, for a split, how
    /// many of the (now partitioned) samples go left.
    fn visit(
        &mut self,
        samples: &mut [usize],
        depth: usize,
        rng: &mut Substream,
    ) -> Result<(NodeIndex, Option<usize>), ForestError> {
        let n_samples = samples.len();
        let mut class_counts = vec![0usize; self.n_classes];
        for &si in samples.iter() {
            class_counts[self.codes[si].index()] += 1;
        }

        let pure = class_counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_few = n_samples < self.min_parent;
        let depth_reached = self.max_depth.is_some_and(|max_d| depth >= max_d);

        if pure || too_few || depth_reached {
            return Ok((self.push_leaf(&class_counts, n_samples), None));
        }

        let matrix = self.projection.generate(rng);
        let n_features = self.x.n_features();
        if let Some(term) = matrix
            .iter()
            .flatten()
            .find(|t| t.feature.index() >= n_features)
        {
            return Err(ForestError::TreeBuild {
                tree: self.tree,
                reason: format!(
                    "projection references feature {} but the data has {n_features}",
                    term.feature
                ),
            });
        }

        let Some(split) = find_best_split(self.x, self.codes, samples, self.n_classes, &matrix)
        else {
            return Ok((self.push_leaf(&class_counts, n_samples), None));
        };

        // Children are linked in once they are pushed.
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(Node::Split {
            projection: matrix.terms(split.projection).to_vec(),
            threshold: split.threshold,
            left: idx,
            right: idx,
        });
        if let Some(counts) = self.node_sample_counts.as_mut() {
            counts.push(n_samples);
        }
        Ok((idx, Some(split.n_left)))
    }

    fn push_leaf(&mut self, class_counts: &[usize], n_samples: usize) -> NodeIndex {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            class: majority(class_counts),
        });
        if let Some(counts) = self.node_sample_counts.as_mut() {
            counts.push(n_samples);
        }
        NodeIndex::new(idx)
    }
}

/// A fitted oblique decision tree.
///
/// Stored as an arena-based `Vec<Node>`; the root is index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ObliqueTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) node_sample_counts: Option<Vec<usize>>,
    pub(crate) oob_indices: Option<Vec<usize>>,
    pub(crate) rotation: Option<Rotation>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl ObliqueTree {
    /// Return the node arena.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the number of feature columns the tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Return the out-of-bag row indices, ascending, when they were stored.
    #[must_use]
    pub fn oob_indices(&self) -> Option<&[usize]> {
        self.oob_indices.as_deref()
    }

    /// Return the training-sample count of each node, aligned with
    /// [`nodes`](Self::nodes), when it was stored.
    #[must_use]
    pub fn node_sample_counts(&self) -> Option<&[usize]> {
        self.node_sample_counts.as_deref()
    }

    /// Return the rotation the tree was trained under, if any.
    #[must_use]
    pub fn rotation(&self) -> Option<&Rotation> {
        self.rotation.as_ref()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    /// Uses an iterative BFS approach.
    #[must_use]
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }

        // BFS: (node_index, current_depth)
        let mut max_depth = 0usize;
        let mut queue = VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }
}
