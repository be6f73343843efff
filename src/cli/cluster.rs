//! Clustering command
//!
//! Runs flat k-means with `--clusters`, or hierarchical k-means with
//! `--branch-size` and `--num-branches`, and writes the centres.

use anyhow::{bail, Context};
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use crate::cluster::cluster_count;
use crate::formats::{Dataset, VectorFormat};
use crate::index::Session;
use crate::types::ElementType;

/// Arguments for `flann cluster`
#[derive(Args)]
pub struct ClusterArgs {
    /// Path to input vectors file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Number of clusters for flat k-means
    #[arg(short, long, conflicts_with = "branch_size")]
    pub clusters: Option<usize>,

    /// Branch size for hierarchical k-means
    #[arg(long)]
    pub branch_size: Option<usize>,

    /// Number of branches for hierarchical k-means
    #[arg(long, default_value = "1")]
    pub num_branches: usize,

    /// Iteration cap (until convergence when omitted)
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Output element type (float32, float64, uint8, int32)
    #[arg(long)]
    pub dtype: Option<String>,

    /// Clustering parameters, e.g. centers_init=kmeanspp
    #[arg(short, long)]
    pub param: Option<String>,

    /// Seed for the session's random generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Path to write centres to; the extension must match the output type
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Cluster a vector file and write the centres
pub fn run(args: ClusterArgs, cli: &crate::Cli) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let overrides = super::parse_overrides(args.param.as_deref())?;
    let output_type = args
        .dtype
        .as_deref()
        .map(ElementType::from_name)
        .transpose()?;

    let dataset = super::load_dataset(&args.input)?;
    let produced_type = output_type.unwrap_or_else(|| dataset.element_type().cluster_output());
    let expected = VectorFormat::for_element_type(produced_type);
    if VectorFormat::from_path(&args.output) != Some(expected) {
        bail!(
            "{} centres must be written to a .{} file",
            produced_type,
            expected.extension()
        );
    }

    let mut session = match args.seed {
        Some(seed) => Session::with_seed(seed),
        None => Session::new(),
    };

    let pb = super::spinner(cli, "clustering")?;
    let centers = match (args.clusters, args.branch_size) {
        (Some(clusters), _) => {
            session.kmeans(dataset.points(), clusters, args.iterations, output_type, &overrides)?
        }
        (None, Some(branch_size)) => {
            match cluster_count(branch_size, args.num_branches) {
                Some(clusters) => log::info!("Hierarchical k-means into {} clusters", clusters),
                None => bail!(
                    "--branch-size {} with --num-branches {} gives no valid cluster count",
                    branch_size,
                    args.num_branches
                ),
            }
            session.hierarchical_kmeans(
                dataset.points(),
                branch_size,
                args.num_branches,
                args.iterations,
                output_type,
                &overrides,
            )?
        }
        (None, None) => bail!("either --clusters or --branch-size is required"),
    };
    super::finish(pb, "clustered");

    let (rows, cols) = centers.shape();
    Dataset::from(centers)
        .write(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    if !cli.no_progress {
        println!(
            "{} centres of dimension {} in {}",
            style(rows).bold().green(),
            cols,
            style(humantime::format_duration(start_time.elapsed())).bold()
        );
        println!("Saved to: {}", args.output.display());
    }
    Ok(())
}
