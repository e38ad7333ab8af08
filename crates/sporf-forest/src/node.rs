use std::fmt;

use crate::label::ClassCode;
use crate::projection::ProjectionTerm;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in an oblique tree arena.
///
/// Children are referenced by [`NodeIndex`]; the root is index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior node splitting on a sparse linear combination of features.
    Split {
        /// Non-zero terms of the projection.
        projection: Vec<ProjectionTerm>,
        /// Samples whose projected value is <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
    },
    /// A terminal node.
    Leaf {
        /// Majority class among the node's training samples.
        class: ClassCode,
    },
}

impl Node {
    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
