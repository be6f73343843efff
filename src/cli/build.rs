//! Index building command
//!
//! Builds an index over a vector file, saves it, and prints the parameter
//! report as JSON.

use anyhow::Context;
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use crate::index::Session;

/// Arguments for `flann build`
#[derive(Args)]
pub struct BuildArgs {
    /// Path to input vectors file (.fvecs, .dvecs, .bvecs, .ivecs)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to output index file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Index parameters, e.g. algorithm=kmeans,branching=16
    #[arg(short, long)]
    pub param: Option<String>,

    /// Seed for the session's random generator
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Build, save and report an index
pub fn run(args: BuildArgs, cli: &crate::Cli) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let overrides = super::parse_overrides(args.param.as_deref())?;

    if !cli.no_progress {
        println!("{}", style("Building index").bold().green());
        println!("  Input: {}", args.input.display());
        println!("  Output: {}", args.output.display());
        println!();
    }

    let dataset = super::load_dataset(&args.input)?;
    let (rows, cols) = dataset.shape();
    log::info!("Loaded {} {} vectors of dimension {}", rows, dataset.element_type(), cols);

    let mut session = match args.seed {
        Some(seed) => Session::with_seed(seed),
        None => Session::new(),
    };

    let pb = super::spinner(cli, "building")?;
    let report = session
        .build_index(dataset.points(), &overrides)
        .context("index build failed")?;
    super::finish(pb, "built");

    session
        .save_index(&args.output)
        .with_context(|| format!("failed to save index to {}", args.output.display()))?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !cli.no_progress {
        println!(
            "\nIndex built in {}",
            style(humantime::format_duration(start_time.elapsed())).bold().green()
        );
        println!("Saved to: {}", args.output.display());
    }

    Ok(())
}
