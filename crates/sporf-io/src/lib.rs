//! CSV input, validation, and JSON artifacts for the sporf pipeline.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::{ExperimentName, TrainingSet};
pub use error::IoError;
pub use reader::TrainingReader;
pub use writer::{BuildArtifact, ResultWriter};
