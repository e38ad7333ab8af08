//! Per-class row indices for stratified bootstrap sampling.

use crate::label::{ClassCode, ClassCounts};

/// Row indices grouped by class code, each group in original row order.
///
/// When present, the groups partition `0..n_samples` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    rows: Vec<Vec<usize>>,
}

impl ClassIndex {
    /// Group row indices by class code.
    pub(crate) fn build(codes: &[ClassCode], counts: &ClassCounts) -> Self {
        let mut rows: Vec<Vec<usize>> = (0..counts.n_classes())
            .map(|k| Vec::with_capacity(counts.class_size(ClassCode::from_index(k))))
            .collect();
        for (row, code) in codes.iter().enumerate() {
            rows[code.index()].push(row);
        }
        Self { rows }
    }

    /// Return the rows belonging to `code`.
    #[must_use]
    pub fn rows(&self, code: ClassCode) -> &[usize] {
        &self.rows[code.index()]
    }

    /// Iterate over `(code, rows)` in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassCode, &[usize])> {
        self.rows
            .iter()
            .enumerate()
            .map(|(k, rows)| (ClassCode::from_index(k), rows.as_slice()))
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.rows.len()
    }
}

/// Build the class index when stratified sampling is requested.
///
/// Returns `None` when `stratify` is false.
pub(crate) fn class_index(
    stratify: bool,
    codes: &[ClassCode],
    counts: &ClassCounts,
) -> Option<ClassIndex> {
    stratify.then(|| ClassIndex::build(codes, counts))
}
