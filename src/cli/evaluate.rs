//! Ground-truth command

use anyhow::{anyhow, Context};
use clap::Args;
use console::style;
use std::path::PathBuf;

use crate::engine::BruteForceEngine;
use crate::evaluation::compute_ground_truth;
use crate::formats::{write_vecs, Dataset};

/// Arguments for `flann ground-truth`
#[derive(Args)]
pub struct GroundTruthArgs {
    /// Reference vectors (.fvecs)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Query vectors (.fvecs)
    #[arg(short, long)]
    pub queries: PathBuf,

    /// Neighbors per query
    #[arg(short, long, default_value = "100")]
    pub k: usize,

    /// Leading matches to skip per query
    #[arg(long, default_value = "0")]
    pub skip: usize,

    /// Output .ivecs file
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Compute exact neighbors and write them as .ivecs
pub fn run(args: GroundTruthArgs, cli: &crate::Cli) -> anyhow::Result<()> {
    let dataset = match super::load_dataset(&args.input)? {
        Dataset::Float32(m) => m,
        other => return Err(anyhow!("ground truth needs float32 input, got {}", other.element_type())),
    };
    let queries = match super::load_dataset(&args.queries)? {
        Dataset::Float32(m) => m,
        other => return Err(anyhow!("ground truth needs float32 queries, got {}", other.element_type())),
    };

    let engine = BruteForceEngine::new();
    let pb = super::spinner(cli, "computing ground truth")?;
    let matches = compute_ground_truth(&engine, dataset.as_points(), queries.as_points(), args.k, args.skip)?;
    super::finish(pb, "done");

    write_vecs(&args.output, &matches).with_context(|| format!("failed to write {}", args.output.display()))?;

    if !cli.no_progress {
        println!(
            "{} x {} neighbors written to {}",
            style(matches.rows()).bold().green(),
            matches.cols(),
            args.output.display()
        );
    }
    Ok(())
}
