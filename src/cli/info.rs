//! Information command
//!
//! Shows the element type, shape and per-column statistics of a vector file.

use clap::Args;
use console::style;
use std::path::PathBuf;

/// Arguments for `flann info`
#[derive(Args)]
pub struct InfoArgs {
    /// Path to file to analyze
    #[arg(short, long)]
    pub input: PathBuf,

    /// Number of columns to show statistics for
    #[arg(long, default_value = "8")]
    pub columns: usize,
}

/// Print a summary of a vector file
pub fn run(args: InfoArgs, cli: &crate::Cli) -> anyhow::Result<()> {
    let dataset = super::load_dataset(&args.input)?;
    let (rows, cols) = dataset.shape();

    if !cli.no_progress {
        println!("{}", style("File Analysis").bold().blue());
        println!("  File: {}", args.input.display());
        println!();
    }

    println!("Element type: {}", style(dataset.element_type()).bold());
    println!("Vectors:      {}", style(rows).bold());
    println!("Dimension:    {}", style(cols).bold());
    println!(
        "Data size:    {}",
        rows * cols * dataset.element_type().size()
    );

    if rows > 0 {
        println!();
        println!("{:>6} {:>12} {:>12} {:>12}", "column", "min", "max", "mean");
        for (col, (min, max, mean)) in dataset.column_stats().into_iter().enumerate().take(args.columns) {
            println!("{:>6} {:>12.4} {:>12.4} {:>12.4}", col, min, max, mean);
        }
        if cols > args.columns {
            println!("  ... {} more columns", cols - args.columns);
        }
    }
    Ok(())
}
