//! Nearest-neighbor search command
//!
//! Searches a saved index when `--index` is given, otherwise runs a one-shot
//! search over the input vectors.

use anyhow::Context;
use clap::Args;
use console::style;
use std::path::PathBuf;
use std::time::Instant;

use crate::formats::{write_vecs, Dataset};
use crate::index::Session;
use crate::search::Neighbors;
use crate::types::Matrix;

/// Arguments for `flann search`
#[derive(Args)]
pub struct SearchArgs {
    /// Reference vectors the index was built over
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path to query vectors file
    #[arg(short, long)]
    pub queries: PathBuf,

    /// Saved index file (one-shot search when omitted)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Number of nearest neighbors to find
    #[arg(short, long, default_value = "10")]
    pub k: usize,

    /// Search parameters, e.g. checks=128
    #[arg(short, long)]
    pub param: Option<String>,

    /// Write neighbor indices to this .ivecs file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Show distances in output
    #[arg(long)]
    pub show_distances: bool,

    /// Maximum number of queries to process
    #[arg(long)]
    pub max_queries: Option<usize>,
}

/// k-NN search, one-shot or against a saved index
pub fn run(args: SearchArgs, cli: &crate::Cli) -> anyhow::Result<()> {
    let start_time = Instant::now();
    let overrides = super::parse_overrides(args.param.as_deref())?;

    if !cli.no_progress {
        println!("{}", style("Searching").bold().green());
        println!("  Input: {}", args.input.display());
        println!("  Queries: {}", args.queries.display());
        println!("  k: {}", args.k);
        println!();
    }

    let dataset = super::load_dataset(&args.input)?;
    let mut queries: Dataset = super::load_dataset(&args.queries)?;
    if let Some(max) = args.max_queries {
        queries = queries.head(max);
    }

    let mut session = Session::new();
    let pb = super::spinner(cli, "searching")?;
    let neighbors = match &args.index {
        Some(index) => {
            session
                .load_index(index, dataset.points())
                .with_context(|| format!("failed to load index {}", index.display()))?;
            session.nn_index(queries.points(), args.k, &overrides)?
        }
        None => session.nn(dataset.points(), queries.points(), args.k, &overrides)?,
    };
    super::finish(pb, "done");

    let elapsed = start_time.elapsed();
    for query in 0..neighbors.len().min(10) {
        let Some((indices, distances)) = neighbors.row(query) else {
            break;
        };
        if args.show_distances {
            let pairs: Vec<String> = indices
                .iter()
                .zip(distances)
                .map(|(i, d)| format!("{}:{:.4}", i, d))
                .collect();
            println!("{:>5}: {}", query, pairs.join(" "));
        } else {
            println!("{:>5}: {:?}", query, indices);
        }
    }
    if neighbors.len() > 10 {
        println!("  ... {} more", neighbors.len() - 10);
    }

    if let Some(output) = &args.output {
        write_vecs(output, &index_matrix(&neighbors)?)
            .with_context(|| format!("failed to write {}", output.display()))?;
        log::info!("Wrote neighbors to {}", output.display());
    }

    if !cli.no_progress {
        println!(
            "\n{} queries in {}",
            style(neighbors.len()).bold(),
            style(humantime::format_duration(elapsed)).bold().green()
        );
    }
    Ok(())
}

fn index_matrix(neighbors: &Neighbors) -> crate::Result<Matrix<i32>> {
    match neighbors {
        Neighbors::Single { indices, .. } => Matrix::from_vec(indices.clone(), indices.len(), 1),
        Neighbors::Multi { indices, .. } => Ok(indices.clone()),
    }
}
