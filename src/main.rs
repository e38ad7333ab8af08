use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use sporf_forest::{CategoricalMapSource, ForestConfig, ProjectionKind, ProjectionOptions};
use sporf_io::{BuildArtifact, ExperimentName, ResultWriter, TrainingReader};

#[derive(Parser)]
#[command(name = "sporf")]
#[command(about = "Build sparse-projection oblique random forests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 1, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,
}

/// Forest construction parameters.
#[derive(Args, Debug, Clone)]
struct ForestArgs {
    /// Number of trees to grow
    #[arg(long, default_value_t = 100)]
    n_trees: usize,

    /// Minimum node size eligible for splitting
    #[arg(long, default_value_t = 6)]
    min_parent: usize,

    /// Maximum tree depth (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_depth: usize,

    /// Out-of-bag fraction when sampling without replacement
    #[arg(long, default_value_t = 0.2)]
    bagging: f64,

    /// Sample without replacement
    #[arg(long, default_value_t = false)]
    no_replacement: bool,

    /// Sample each class separately
    #[arg(long, default_value_t = false)]
    stratify: bool,

    /// Candidate projections per node (defaults to ceil(sqrt(n_features)))
    #[arg(long)]
    n_projections: Option<usize>,

    /// Nonzero fraction of each projection (defaults to 1 / n_features)
    #[arg(long)]
    sparsity: Option<f64>,

    /// Projection weights: "binary", "continuous", or "axis"
    #[arg(long, default_value = "binary")]
    projection: String,

    /// Replace each feature column by its ranks
    #[arg(long, default_value_t = false)]
    rank_transform: bool,

    /// Keep out-of-bag indices on each tree
    #[arg(long, default_value_t = false)]
    store_oob: bool,

    /// Keep per-node sample counts on each tree
    #[arg(long, default_value_t = false)]
    store_ns: bool,

    /// Log each completed tree
    #[arg(long, default_value_t = false)]
    progress: bool,

    /// Apply a random rotation to each tree's data
    #[arg(long, default_value_t = false)]
    rotate: bool,

    /// Worker threads (0 = all cores but one)
    #[arg(long, default_value_t = 0)]
    num_cores: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Build a forest from a labelled CSV table
    Build {
        /// Path to the training CSV (header row, one label column)
        #[arg(long)]
        data: PathBuf,

        /// Name of the label column
        #[arg(long)]
        label_column: String,

        /// Experiment name used for output file naming
        #[arg(long)]
        experiment: String,

        /// Directory for output files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// JSON file of one-hot column groups (zero-based feature indices)
        #[arg(long)]
        cat_map: Option<PathBuf>,

        #[command(flatten)]
        forest: ForestArgs,
    },
}

fn parse_projection_kind(s: &str) -> Result<ProjectionKind> {
    match s {
        "binary" => Ok(ProjectionKind::Binary),
        "continuous" => Ok(ProjectionKind::Continuous),
        "axis" => Ok(ProjectionKind::Axis),
        other => anyhow::bail!("unknown projection kind: {other} (expected binary, continuous, or axis)"),
    }
}

fn projection_options(args: &ForestArgs, n_features: usize) -> Result<ProjectionOptions> {
    let mut options = ProjectionOptions::for_features(n_features)
        .with_kind(parse_projection_kind(&args.projection)?);
    if let Some(n) = args.n_projections {
        options = options.with_n_projections(n);
    }
    if let Some(s) = args.sparsity {
        options = options.with_sparsity(s);
    }
    Ok(options)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Build {
            data,
            label_column,
            experiment,
            output_dir,
            cat_map,
            forest: args,
        } => {
            let experiment_name = ExperimentName::new(experiment.clone())?;

            // 1. Read training table
            let dataset = TrainingReader::new(&data, &label_column)
                .read()
                .context("failed to read training CSV")?;
            let feature_names = dataset.feature_names().to_vec();
            let options = projection_options(&args, dataset.n_features())?;

            // 2. Configure
            let max_depth = (args.max_depth > 0).then_some(args.max_depth);
            let mut config = ForestConfig::new(args.n_trees)?
                .with_min_parent(args.min_parent)
                .with_max_depth(max_depth)
                .with_bagging(args.bagging)
                .with_replacement(!args.no_replacement)
                .with_stratify(args.stratify)
                .with_projection_options(options)
                .with_rank_transform(args.rank_transform)
                .with_store_oob(args.store_oob)
                .with_store_ns(args.store_ns)
                .with_progress(args.progress)
                .with_rotate(args.rotate)
                .with_num_cores(args.num_cores)
                .with_seed(cli.seed);
            if let Some(path) = cat_map {
                config = config.with_categorical_map(CategoricalMapSource::Path(path));
            }

            // 3. Build
            let (features, labels) = dataset.into_parts();
            let forest = config.fit(&features, labels).context("forest build failed")?;

            // 4. Write artifacts
            let writer = ResultWriter::new(&output_dir, experiment_name)?;
            writer.write_build(&forest, &feature_names)?;
            forest
                .save(writer.forest_path())
                .context("failed to save forest")?;
            info!(path = %writer.forest_path().display(), "forest saved");

            // 5. Print summary
            let summary = BuildArtifact::new(&experiment, &forest, &feature_names);
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
