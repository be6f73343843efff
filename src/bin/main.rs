//! FLANN command-line interface
//!
//! Builds, searches and clusters vector files through the FLANN control
//! layer.

use clap::{Parser, Subcommand};
use console::style;

use flann::cli::{build, cluster, evaluate, info, radius, search};

#[derive(Parser)]
#[command(name = "flann")]
#[command(about = "Approximate nearest-neighbor indexes and clustering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress spinners and banners
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build an index from vectors and save it
    Build(build::BuildArgs),

    /// k-nearest-neighbor search
    Search(search::SearchArgs),

    /// Radius search for a single point
    Radius(radius::RadiusArgs),

    /// k-means or hierarchical k-means clustering
    Cluster(cluster::ClusterArgs),

    /// Exact neighbors for evaluating approximate search
    GroundTruth(evaluate::GroundTruthArgs),

    /// Show information about a vector file
    Info(info::InfoArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if !cli.no_progress {
        println!("{}", style("FLANN").bold().blue());
        println!("{}", style(format!("version {}", flann::VERSION)).dim());
        println!();
    }

    let lib_cli = flann::Cli {
        verbose: cli.verbose,
        no_progress: cli.no_progress,
    };

    match cli.command {
        Commands::Build(args) => build::run(args, &lib_cli),
        Commands::Search(args) => search::run(args, &lib_cli),
        Commands::Radius(args) => radius::run(args, &lib_cli),
        Commands::Cluster(args) => cluster::run(args, &lib_cli),
        Commands::GroundTruth(args) => evaluate::run(args, &lib_cli),
        Commands::Info(args) => info::run(args, &lib_cli),
    }
}
