//! Radius search command

use anyhow::{bail, Context};
use clap::Args;
use console::style;
use std::path::PathBuf;

use crate::engine::dispatch::with_points;
use crate::index::Session;
use crate::types::{PointSet, Points};

/// Arguments for `flann radius`
#[derive(Args)]
pub struct RadiusArgs {
    /// Reference vectors the index was built over
    #[arg(short, long)]
    pub input: PathBuf,

    /// Saved index file
    #[arg(long)]
    pub index: PathBuf,

    /// File holding the query point
    #[arg(short, long)]
    pub queries: PathBuf,

    /// Row of the queries file to search with
    #[arg(long, default_value = "0")]
    pub row: usize,

    /// Search radius (squared distance for euclidean)
    #[arg(short, long)]
    pub radius: f32,

    /// Maximum number of matches
    #[arg(long)]
    pub max: Option<usize>,

    /// Search parameters, e.g. checks=128
    #[arg(short, long)]
    pub param: Option<String>,
}

/// Radius search around one query row
pub fn run(args: RadiusArgs, cli: &crate::Cli) -> anyhow::Result<()> {
    let overrides = super::parse_overrides(args.param.as_deref())?;
    let dataset = super::load_dataset(&args.input)?;
    let queries = super::load_dataset(&args.queries)?;

    let rows = queries.shape().0;
    if args.row >= rows {
        bail!("row {} out of range, {} has {} rows", args.row, args.queries.display(), rows);
    }
    let query = single_row(queries.points(), args.row);

    let mut session = Session::new();
    session
        .load_index(&args.index, dataset.points())
        .with_context(|| format!("failed to load index {}", args.index.display()))?;

    let matches = session.nn_radius(query, args.radius, args.max, &overrides)?;

    if !cli.no_progress {
        println!(
            "{} points within {} of query {}",
            style(matches.len()).bold().green(),
            args.radius,
            args.row
        );
    }
    for (index, distance) in matches.indices.iter().zip(&matches.distances) {
        println!("{}\t{}", index, distance);
    }
    Ok(())
}

fn single_row(points: PointSet<'_>, row: usize) -> PointSet<'_> {
    with_points!(points, p => Points::from_row(p.row(row)).into())
}
