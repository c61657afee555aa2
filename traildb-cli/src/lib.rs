//! Command-line interface for the trail database batch jobs.
//!
//! Each subcommand is one independent run: register a trail, update trails
//! from Overpass, recalculate statistics, build the trail collections,
//! refresh the POI tile cache or build the per-trail POI collections.
//! Options layer CLI flags over `TRAILDB_*` environment variables and
//! configuration files.
#![forbid(unsafe_code)]

mod error;
mod pois;
mod remote;
mod trails;

use std::future::Future;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use traildb_data::DataLayout;

pub use error::CliError;

const ARG_DATA_DIR: &str = "data-dir";
const ARG_DIST_DIR: &str = "dist-dir";
const ARG_ENDPOINT: &str = "endpoint";
const ARG_USER_AGENT: &str = "user-agent";
const ARG_TIMEOUT_SECS: &str = "timeout-secs";
const ARG_PAUSE_SECS: &str = "pause-secs";
const ARG_RATE_LIMIT_PAUSE_SECS: &str = "rate-limit-pause-secs";
const ARG_MAX_RETRIES: &str = "max-retries";
const ARG_CUTOFF: &str = "cutoff";
const ARG_SOURCE_LABEL: &str = "source-label";
const ARG_LOG_UNMATCHED: &str = "log-unmatched";
const ARG_TRAIL_ID: &str = "id";
const ARG_TRAIL_NAME: &str = "name";
const ARG_RELATION: &str = "relation";
const ARG_COLOR: &str = "color";
const ARG_WIKIDATA: &str = "wikidata";
const ARG_POI_SCHEMA: &str = "poi-schema";
const ARG_TRAIL_COLLECTION: &str = "trail-collection";
const ENV_TRAIL_ID: &str = "TRAILDB_CMDS_REGISTER_ID";
const ENV_TRAIL_NAME: &str = "TRAILDB_CMDS_REGISTER_NAME";
const ENV_RELATION: &str = "TRAILDB_CMDS_REGISTER_RELATION";

/// Run the traildb CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging(cli.verbose);
    match cli.command {
        Command::Register(args) => trails::run_register(args),
        Command::UpdateTrails(args) => trails::run_update(args),
        Command::RecalculateStats(args) => trails::run_recalculate(args),
        Command::BuildTrails(args) => trails::run_build(args),
        Command::UpdatePois(args) => pois::run_update(args),
        Command::BuildPois(args) => pois::run_build(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "traildb",
    about = "Maintain a trail database synchronised with OpenStreetMap",
    version
)]
struct Cli {
    /// Log per-element detail.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a trail to the index.
    Register(trails::RegisterArgs),
    /// Import new trails and re-synchronise the ones that changed.
    UpdateTrails(trails::UpdateTrailsArgs),
    /// Re-derive statistics and status from stored snapshots.
    RecalculateStats(trails::LocalArgs),
    /// Write the simplified trail collections.
    BuildTrails(trails::LocalArgs),
    /// Refresh the POI tile cache around every trail.
    UpdatePois(pois::UpdatePoisArgs),
    /// Match cached POIs against every trail.
    BuildPois(pois::BuildPoisArgs),
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn layout(data_dir: Option<Utf8PathBuf>, dist_dir: Option<Utf8PathBuf>) -> DataLayout {
    let defaults = DataLayout::default();
    DataLayout::new(
        data_dir.unwrap_or_else(|| defaults.data_dir().to_path_buf()),
        dist_dir.unwrap_or_else(|| defaults.dist_dir().to_path_buf()),
    )
}

fn block_on<F: Future>(future: F) -> Result<F::Output, CliError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests;
