//! Label normalization into dense class codes.
//!
//! Distinct label values are sorted (lexicographically for categorical
//! labels, numerically for numeric labels) and ranked `1..=K`. The sorted
//! distinct values are kept as the label list used to decode codes back into
//! the original domain.

use std::fmt;

use tracing::debug;

use crate::error::ForestError;

/// A label vector in its original domain.
///
/// Also used for the ordered label list of a fitted forest, where entry
/// `i` is the original value of class code `i + 1`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Labels {
    /// String-valued class labels.
    Categorical(Vec<String>),
    /// Number-valued class labels. Must be finite.
    Numeric(Vec<f64>),
}

impl Labels {
    /// Return the number of labels.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Labels::Categorical(values) => values.len(),
            Labels::Numeric(values) => values.len(),
        }
    }

    /// Return `true` if there are no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Encode the labels into dense class codes.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | there are no labels |
    /// | [`ForestError::InvalidLabelType`] | a numeric label is NaN or infinite |
    pub fn encode(&self) -> Result<EncodedLabels, ForestError> {
        if self.is_empty() {
            return Err(ForestError::EmptyDataset);
        }

        let (codes, classes): (Vec<ClassCode>, Labels) = match self {
            Labels::Categorical(values) => {
                let mut classes = values.clone();
                classes.sort_unstable();
                classes.dedup();
                let codes = values
                    .iter()
                    .map(|v| ClassCode::from_index(classes.partition_point(|c| c < v)))
                    .collect();
                (codes, Labels::Categorical(classes))
            }
            Labels::Numeric(values) => {
                if let Some(position) = values.iter().position(|v| !v.is_finite()) {
                    return Err(ForestError::InvalidLabelType {
                        reason: format!(
                            "numeric label at position {position} is {}",
                            values[position]
                        ),
                    });
                }
                let mut classes = values.clone();
                classes.sort_by(f64::total_cmp);
                // -0.0 and 0.0 compare equal and share a class.
                classes.dedup_by(|a, b| a == b);
                let codes = values
                    .iter()
                    .map(|&v| ClassCode::from_index(classes.partition_point(|&c| c < v)))
                    .collect();
                (codes, Labels::Numeric(classes))
            }
        };

        let counts = ClassCounts::from_codes(&codes, classes.len());
        debug!(
            n_labels = codes.len(),
            n_classes = classes.len(),
            "labels encoded"
        );

        Ok(EncodedLabels {
            codes,
            classes,
            counts,
        })
    }

    /// Decode class codes against this label list.
    ///
    /// `self` must be the label list produced by [`Labels::encode`]; the
    /// result has the same variant.
    ///
    /// # Panics
    ///
    /// Panics if a code exceeds the number of classes in the list.
    #[must_use]
    pub fn decode(&self, codes: &[ClassCode]) -> Labels {
        match self {
            Labels::Categorical(classes) => {
                Labels::Categorical(codes.iter().map(|c| classes[c.index()].clone()).collect())
            }
            Labels::Numeric(classes) => {
                Labels::Numeric(codes.iter().map(|c| classes[c.index()]).collect())
            }
        }
    }
}

impl From<Vec<String>> for Labels {
    fn from(values: Vec<String>) -> Self {
        Labels::Categorical(values)
    }
}

impl From<Vec<&str>> for Labels {
    fn from(values: Vec<&str>) -> Self {
        Labels::Categorical(values.into_iter().map(String::from).collect())
    }
}

impl From<Vec<f64>> for Labels {
    fn from(values: Vec<f64>) -> Self {
        Labels::Numeric(values)
    }
}

/// Dense class code in `1..=K`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u32")]
pub struct ClassCode(u32);

impl ClassCode {
    /// Create a class code from its 1-based value. Returns `None` for zero.
    #[must_use]
    pub fn new(code: u32) -> Option<Self> {
        (code >= 1).then_some(Self(code))
    }

    /// Create a class code from a zero-based class slot.
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32 + 1)
    }

    /// Return the 1-based code.
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Return the zero-based class slot (`code - 1`).
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl TryFrom<u32> for ClassCode {
    type Error = &'static str;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        ClassCode::new(code).ok_or("class code must be at least 1")
    }
}

impl fmt::Display for ClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cumulative per-class counts in ascending code order.
///
/// Entry `k` is the number of samples whose code is at most `k + 1`, so the
/// sequence is non-decreasing and its last element equals the sample count.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ClassCounts(Vec<usize>);

impl ClassCounts {
    fn from_codes(codes: &[ClassCode], n_classes: usize) -> Self {
        let mut counts = vec![0usize; n_classes];
        for code in codes {
            counts[code.index()] += 1;
        }
        let mut running = 0usize;
        for count in &mut counts {
            running += *count;
            *count = running;
        }
        Self(counts)
    }

    /// Return the cumulative counts.
    #[must_use]
    pub fn cumulative(&self) -> &[usize] {
        &self.0
    }

    /// Return the number of classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.0.len()
    }

    /// Return the total number of samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.last().copied().unwrap_or(0)
    }

    /// Return the number of samples in a single class.
    #[must_use]
    pub fn class_size(&self, code: ClassCode) -> usize {
        let k = code.index();
        let below = if k == 0 { 0 } else { self.0[k - 1] };
        self.0[k] - below
    }
}

/// Output of [`Labels::encode`].
#[derive(Debug, Clone)]
pub struct EncodedLabels {
    codes: Vec<ClassCode>,
    classes: Labels,
    counts: ClassCounts,
}

impl EncodedLabels {
    /// Return the per-sample class codes.
    #[must_use]
    pub fn codes(&self) -> &[ClassCode] {
        &self.codes
    }

    /// Return the ordered label list (original value of each code).
    #[must_use]
    pub fn classes(&self) -> &Labels {
        &self.classes
    }

    /// Return the cumulative class counts.
    #[must_use]
    pub fn counts(&self) -> &ClassCounts {
        &self.counts
    }

    /// Return the number of distinct classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Consume and return `(codes, label list, counts)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<ClassCode>, Labels, ClassCounts) {
        (self.codes, self.classes, self.counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(codes: &[ClassCode]) -> Vec<u32> {
        codes.iter().map(|c| c.get()).collect()
    }

    #[test]
    fn numeric_labels_scenario() {
        let encoded = Labels::from(vec![1.0, 1.0, 2.0, 2.0, 3.0]).encode().unwrap();
        assert_eq!(raw(encoded.codes()), vec![1, 1, 2, 2, 3]);
        assert_eq!(encoded.classes(), &Labels::Numeric(vec![1.0, 2.0, 3.0]));
        assert_eq!(encoded.counts().cumulative(), &[2, 4, 5]);
    }

    #[test]
    fn categorical_labels_sorted_lexicographically() {
        let encoded = Labels::from(vec!["versicolor", "setosa", "virginica", "setosa"])
            .encode()
            .unwrap();
        assert_eq!(raw(encoded.codes()), vec![2, 1, 3, 1]);
        assert_eq!(
            encoded.classes(),
            &Labels::from(vec!["setosa", "versicolor", "virginica"])
        );
        assert_eq!(encoded.counts().cumulative(), &[2, 3, 4]);
    }

    #[test]
    fn numeric_labels_sorted_numerically() {
        // Lexicographic order would put 10 before 9.
        let encoded = Labels::from(vec![10.0, 9.0, -1.5]).encode().unwrap();
        assert_eq!(raw(encoded.codes()), vec![3, 2, 1]);
    }

    #[test]
    fn categorical_round_trip() {
        let labels = Labels::from(vec!["b", "a", "c", "a", "b", "b"]);
        let encoded = labels.encode().unwrap();
        assert_eq!(encoded.classes().decode(encoded.codes()), labels);
    }

    #[test]
    fn numeric_round_trip() {
        let labels = Labels::from(vec![0.5, -2.0, 7.0, 0.5, 7.0]);
        let encoded = labels.encode().unwrap();
        assert_eq!(encoded.classes().decode(encoded.codes()), labels);
    }

    #[test]
    fn signed_zero_shares_a_class() {
        let encoded = Labels::from(vec![0.0, -0.0, 1.0]).encode().unwrap();
        assert_eq!(encoded.n_classes(), 2);
        assert_eq!(raw(encoded.codes()), vec![1, 1, 2]);
    }

    #[test]
    fn counts_non_decreasing_and_total() {
        let labels = Labels::from(vec!["x", "z", "y", "z", "z", "x", "y"]);
        let encoded = labels.encode().unwrap();
        let counts = encoded.counts();
        assert!(counts.cumulative().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(counts.total(), labels.len());
        assert_eq!(counts.class_size(ClassCode::new(1).unwrap()), 2);
        assert_eq!(counts.class_size(ClassCode::new(3).unwrap()), 3);
    }

    #[test]
    fn non_finite_numeric_label_rejected() {
        let err = Labels::from(vec![1.0, f64::NAN]).encode().unwrap_err();
        assert!(matches!(err, ForestError::InvalidLabelType { .. }));
    }

    #[test]
    fn empty_labels_rejected() {
        let err = Labels::Numeric(vec![]).encode().unwrap_err();
        assert!(matches!(err, ForestError::EmptyDataset));
    }

    #[test]
    fn class_code_zero_is_invalid() {
        assert!(ClassCode::new(0).is_none());
        assert_eq!(ClassCode::new(4).unwrap().index(), 3);
        assert_eq!(format!("{}", ClassCode::new(2).unwrap()), "2");
    }

    #[test]
    fn deserialize_rejects_zero_class_code() {
        assert!(serde_json::from_str::<ClassCode>("0").is_err());
        let code: ClassCode = serde_json::from_str("3").unwrap();
        assert_eq!(code.index(), 2);
        assert_eq!(serde_json::to_string(&code).unwrap(), "3");
    }
}
