//! JSON artifact writer for forest builds.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sporf_forest::{Forest, Labels, ObliqueTree, ProjectionKind, StrategyKind};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Writes build artifacts for one experiment.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_build.json` and
/// `{experiment}_forest.bin`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Write a build summary to `{experiment}_build.json`.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::SerializeArtifact`] | JSON encoding failed |
    /// | [`IoError::WriteFile`] | file write failed |
    #[instrument(skip_all)]
    pub fn write_build(
        &self,
        forest: &Forest<ObliqueTree>,
        feature_names: &[String],
    ) -> Result<PathBuf, IoError> {
        let path = self
            .output_dir
            .join(format!("{}_build.json", self.experiment.as_str()));

        let artifact = BuildArtifact::new(self.experiment.as_str(), forest, feature_names);

        let json = serde_json::to_string_pretty(&artifact).map_err(|e| {
            IoError::SerializeArtifact {
                path: path.clone(),
                source: e,
            }
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;

        info!(path = %path.display(), "build summary written");
        Ok(path)
    }

    /// Return the path where the forest binary should be saved.
    ///
    /// Does not write anything; computes `{output_dir}/{experiment}_forest.bin`.
    #[must_use]
    pub fn forest_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_forest.bin", self.experiment.as_str()))
    }
}

// --- Shadow structs for JSON serialization ---

/// Summary of a built forest, as written to `{experiment}_build.json`.
///
/// Also used by the CLI for its stdout summary.
#[derive(Debug, Serialize)]
pub struct BuildArtifact<'a> {
    experiment: &'a str,
    n_trees: usize,
    n_features: usize,
    n_classes: usize,
    labels: &'a Labels,
    feature_names: &'a [String],
    seed: u64,
    strategy: StrategyKind,
    projection_kind: ProjectionKind,
    n_projections: usize,
    sparsity: f64,
    trees: Vec<TreeEntry>,
}

#[derive(Debug, Serialize)]
struct TreeEntry {
    n_nodes: usize,
    n_leaves: usize,
    depth: usize,
    n_oob: Option<usize>,
}

impl<'a> BuildArtifact<'a> {
    /// Summarize `forest` for the named experiment.
    #[must_use]
    pub fn new(
        experiment: &'a str,
        forest: &'a Forest<ObliqueTree>,
        feature_names: &'a [String],
    ) -> Self {
        let options = forest.projection().options();
        let trees = forest
            .trees()
            .iter()
            .map(|t| TreeEntry {
                n_nodes: t.n_nodes(),
                n_leaves: t.n_leaves(),
                depth: t.depth(),
                n_oob: t.oob_indices().map(<[usize]>::len),
            })
            .collect();
        Self {
            experiment,
            n_trees: forest.n_trees(),
            n_features: forest.n_features(),
            n_classes: forest.n_classes(),
            labels: forest.labels(),
            feature_names,
            seed: forest.config().seed(),
            strategy: forest.projection().kind(),
            projection_kind: options.kind(),
            n_projections: options.n_projections(),
            sparsity: options.sparsity(),
            trees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sporf_forest::ForestConfig;
    use tempfile::TempDir;

    fn small_forest() -> Forest {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![5.0, 5.0],
            vec![5.1, 5.0],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
        ];
        let labels = vec!["lo", "lo", "mid", "mid", "hi", "hi"];
        ForestConfig::new(3)
            .unwrap()
            .with_min_parent(2)
            .with_store_oob(true)
            .with_num_cores(1)
            .fit(&features, labels)
            .unwrap()
    }

    #[test]
    fn write_build_json_structure() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("test_run".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();

        let forest = small_forest();
        let names = vec!["x".to_string(), "y".to_string()];
        let path = writer.write_build(&forest, &names).unwrap();
        assert_eq!(path, dir.path().join("test_run_build.json"));

        let content: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(content["experiment"], "test_run");
        assert_eq!(content["n_trees"], 3);
        assert_eq!(content["n_features"], 2);
        assert_eq!(content["n_classes"], 3);
        assert_eq!(content["seed"], 1);
        assert_eq!(content["strategy"], "Numeric");
        assert_eq!(content["projection_kind"], "Binary");
        assert_eq!(content["labels"]["Categorical"][0], "hi");
        assert_eq!(content["feature_names"][1], "y");
        let trees = content["trees"].as_array().unwrap();
        assert_eq!(trees.len(), 3);
        assert!(trees.iter().all(|t| t["n_nodes"].as_u64().unwrap() >= 1));
        assert!(trees.iter().all(|t| t["n_oob"].is_number()));
    }

    #[test]
    fn forest_path_naming() {
        let dir = TempDir::new().unwrap();
        let experiment = ExperimentName::new("exp1".into()).unwrap();
        let writer = ResultWriter::new(dir.path(), experiment).unwrap();
        assert_eq!(writer.forest_path(), dir.path().join("exp1_forest.bin"));
    }

    #[test]
    fn creates_nested_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let experiment = ExperimentName::new("nested".into()).unwrap();
        ResultWriter::new(&nested, experiment).unwrap();
        assert!(nested.is_dir());
    }
}
