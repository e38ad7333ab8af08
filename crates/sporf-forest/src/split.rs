use crate::label::ClassCode;
use crate::matrix::TrainingMatrix;
use crate::projection::{ProjectionMatrix, ProjectionTerm};

/// Gini impurity `1 - Σ(p_i²)` of a node with the given class counts.
///
/// Returns 0.0 when `n_samples` is zero.
#[must_use]
pub(crate) fn gini(class_counts: &[usize], n_samples: usize) -> f64 {
    if n_samples == 0 {
        return 0.0;
    }
    let n = n_samples as f64;
    let sum_sq: f64 = class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum();
    1.0 - sum_sq
}

/// Result of finding the best projected split for a node.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SplitResult {
    /// Column of the projection matrix that produced the split.
    pub(crate) projection: usize,
    /// Samples whose projected value is <= threshold go left.
    pub(crate) threshold: f64,
    /// Number of samples moved to the front of the slice (the left child).
    pub(crate) n_left: usize,
}

/// Project one sample onto a sparse combination of features.
pub(crate) fn project(x: &TrainingMatrix, sample: usize, terms: &[ProjectionTerm]) -> f64 {
    terms
        .iter()
        .map(|t| t.weight * x.get(sample, t.feature.index()))
        .sum()
}

/// Find the best split over every projection in `matrix`.
///
/// For each projection, sorts the `(projected value, sample)` pairs, scans
/// left-to-right with incremental class count updates, and keeps the first
/// split with the strictly largest impurity decrease. Ties keep the earlier
/// projection and the earlier boundary.
///
/// On success `sample_indices` is stably partitioned in place: the first
/// `n_left` entries go left, the rest go right. Returns `None`, leaving the
/// slice untouched, when no projection separates any two samples.
pub(crate) fn find_best_split(
    x: &TrainingMatrix,
    codes: &[ClassCode],
    sample_indices: &mut [usize],
    n_classes: usize,
    matrix: &ProjectionMatrix,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples < 2 {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &si in sample_indices.iter() {
        parent_counts[codes[si].index()] += 1;
    }
    let parent_impurity = gini(&parent_counts, n_samples);

    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n_samples);

    for (p, terms) in matrix.iter().enumerate() {
        if terms.is_empty() {
            continue;
        }

        sorted.clear();
        sorted.extend(sample_indices.iter().map(|&si| (project(x, si, terms), si)));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();

        for i in 0..(n_samples - 1) {
            let (val_i, si) = sorted[i];
            let class_i = codes[si].index();
            left_counts[class_i] += 1;
            right_counts[class_i] -= 1;

            let val_next = sorted[i + 1].0;
            if val_i >= val_next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            let decrease = (n_samples as f64) * parent_impurity
                - (n_left as f64) * gini(&left_counts, n_left)
                - (n_right as f64) * gini(&right_counts, n_right);

            if best.is_none_or(|(_, _, d)| decrease > d) {
                let mid = val_i + (val_next - val_i) / 2.0;
                let threshold = if mid < val_next { mid } else { val_i };
                best = Some((p, threshold, decrease));
            }
        }
    }

    let (projection, threshold, _) = best?;

    // Recompute rather than reuse the sort so the partition matches the
    // stored split exactly.
    let terms = matrix.terms(projection);
    let n_left = partition(sample_indices, |si| project(x, si, terms) <= threshold);

    Some(SplitResult {
        projection,
        threshold,
        n_left,
    })
}

/// Stable in-place partition. Returns the number of entries satisfying
/// `goes_left`, which end up at the front in their original order.
fn partition(samples: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut right = Vec::new();
    let mut n_left = 0;
    for i in 0..samples.len() {
        let si = samples[i];
        if goes_left(si) {
            samples[n_left] = si;
            n_left += 1;
        } else {
            right.push(si);
        }
    }
    samples[n_left..].copy_from_slice(&right);
    n_left
}
