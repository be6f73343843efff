//! Command-line interface modules
//!
//! This module contains all CLI command implementations.

/// `flann build`
pub mod build;
/// `flann cluster`
pub mod cluster;
/// `flann ground-truth`
pub mod evaluate;
/// `flann info`
pub mod info;
/// `flann radius`
pub mod radius;
/// `flann search`
pub mod search;

use crate::formats::Dataset;
use crate::params::ParamOverrides;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

/// Read a vector file, naming it in the error
pub(crate) fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    Dataset::read(path).with_context(|| format!("failed to read vectors from {}", path.display()))
}

/// Parse a `--param key=value,...` argument
pub(crate) fn parse_overrides(text: Option<&str>) -> anyhow::Result<ParamOverrides> {
    match text {
        Some(text) => text
            .parse()
            .with_context(|| format!("invalid --param '{}'", text)),
        None => Ok(ParamOverrides::new()),
    }
}

/// Spinner shown while an engine call runs; `None` with `--no-progress`
pub(crate) fn spinner(cli: &crate::Cli, message: &str) -> anyhow::Result<Option<ProgressBar>> {
    if cli.no_progress {
        return Ok(None);
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(Some(pb))
}

pub(crate) fn finish(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}
