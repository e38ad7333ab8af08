//! Model serialization and deserialization via bincode.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::Forest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope written to disk.
#[derive(serde::Serialize)]
struct ModelEnvelopeRef<'a, T> {
    format_version: u32,
    n_trees: usize,
    n_features: usize,
    n_classes: usize,
    forest: &'a Forest<T>,
}

/// Versioned envelope read back from disk. Field order matches
/// [`ModelEnvelopeRef`].
#[derive(serde::Deserialize)]
struct ModelEnvelope<T> {
    format_version: u32,
    n_trees: usize,
    n_features: usize,
    n_classes: usize,
    forest: Forest<T>,
}

impl<T> Forest<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Save the forest to a binary file.
    ///
    /// A caller-supplied projection generator is not persisted; the loaded
    /// forest keeps the resolved [`crate::StrategyKind`] only.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelopeRef {
            format_version: FORMAT_VERSION,
            n_trees: self.trees.len(),
            n_features: self.n_features,
            n_classes: self.labels.len(),
            forest: self,
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|e| ForestError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| ForestError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.trees.len(),
            "model saved"
        );

        Ok(())
    }

    /// Load a forest from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| ForestError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        // The version is the first field of the envelope; check it before
        // decoding the rest so older layouts report a version mismatch.
        let found: u32 =
            bincode::deserialize(&bytes).map_err(|e| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;
        if found != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found,
                path: path.to_path_buf(),
            });
        }

        let envelope: ModelEnvelope<T> =
            bincode::deserialize(&bytes).map_err(|e| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        debug!(
            format_version = envelope.format_version,
            n_trees = envelope.n_trees,
            n_features = envelope.n_features,
            n_classes = envelope.n_classes,
            "model loaded"
        );

        Ok(envelope.forest)
    }
}
