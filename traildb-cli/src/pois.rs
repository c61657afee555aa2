//! POI subcommands: refresh the tile cache and build per-trail collections.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use traildb_core::{MatcherOptions, Spherical, Timestamp};
use traildb_data::{DataLayout, POI_SOURCE_LABEL, PoiJobOptions, PoiJobs, Throttle};

use crate::{
    ARG_CUTOFF, ARG_DATA_DIR, ARG_DIST_DIR, ARG_ENDPOINT, ARG_LOG_UNMATCHED, ARG_MAX_RETRIES,
    ARG_PAUSE_SECS, ARG_POI_SCHEMA, ARG_RATE_LIMIT_PAUSE_SECS, ARG_SOURCE_LABEL,
    ARG_TIMEOUT_SECS, ARG_TRAIL_COLLECTION, ARG_USER_AGENT, CliError, block_on, layout,
    remote::{RemoteConfig, RemoteOptions},
};

/// CLI arguments for `update-pois`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Download every POI tile within the corridor of a built \
                 trail, one request at a time, and store it under the data \
                 directory. Tiles whose data predates the cutoff are \
                 requested again.",
    about = "Refresh the POI tile cache"
)]
#[ortho_config(prefix = "TRAILDB")]
pub(crate) struct UpdatePoisArgs {
    /// Directory holding the POI schema and tile cache.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Directory holding the built trail collections.
    #[arg(long = ARG_DIST_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) dist_dir: Option<Utf8PathBuf>,
    /// Label of the trail collection to read lines from (default `002`).
    #[arg(long = ARG_SOURCE_LABEL, value_name = "label")]
    #[serde(default)]
    pub(crate) source_label: Option<String>,
    /// Overpass interpreter URL.
    #[arg(long = ARG_ENDPOINT, value_name = "url")]
    #[serde(default)]
    pub(crate) endpoint: Option<String>,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Whole-request timeout in seconds.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
    /// Pause between tile downloads in seconds (default 0).
    #[arg(long = ARG_PAUSE_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) pause_secs: Option<u64>,
    /// Pause after a rate-limited or stale response in seconds (default 10).
    #[arg(long = ARG_RATE_LIMIT_PAUSE_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) rate_limit_pause_secs: Option<u64>,
    /// Retries per tile (default 10).
    #[arg(long = ARG_MAX_RETRIES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_retries: Option<u32>,
    /// Run cutoff; defaults to the start of yesterday (UTC).
    #[arg(long = ARG_CUTOFF, value_name = "date")]
    #[serde(default)]
    pub(crate) cutoff: Option<String>,
}

impl UpdatePoisArgs {
    fn into_config(self, now: Timestamp) -> Result<UpdatePoisConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        UpdatePoisConfig::resolve(merged, now)
    }
}

/// Resolved `update-pois` configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UpdatePoisConfig {
    pub(crate) layout: DataLayout,
    pub(crate) options: PoiJobOptions,
    pub(crate) remote: RemoteConfig,
}

impl UpdatePoisConfig {
    pub(crate) fn resolve(args: UpdatePoisArgs, now: Timestamp) -> Result<Self, CliError> {
        let options = RemoteOptions {
            endpoint: args.endpoint,
            user_agent: args.user_agent,
            timeout_secs: args.timeout_secs,
            pause_secs: args.pause_secs,
            rate_limit_pause_secs: args.rate_limit_pause_secs,
            max_retries: args.max_retries,
            cutoff: args.cutoff,
        };
        Ok(Self {
            layout: layout(args.data_dir, args.dist_dir),
            options: job_options(args.source_label, false),
            remote: RemoteConfig::resolve(options, Throttle::for_poi_tiles(), now)?,
        })
    }
}

/// CLI arguments for `build-pois`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Match cached POIs against every trail")]
#[ortho_config(prefix = "TRAILDB")]
pub(crate) struct BuildPoisArgs {
    /// Directory holding the POI schema and tile cache.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Directory holding the trail collections and receiving POI output.
    #[arg(long = ARG_DIST_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) dist_dir: Option<Utf8PathBuf>,
    /// Label of the trail collection to read lines from (default `002`).
    #[arg(long = ARG_SOURCE_LABEL, value_name = "label")]
    #[serde(default)]
    pub(crate) source_label: Option<String>,
    /// Log elements no POI type accepts.
    #[arg(long = ARG_LOG_UNMATCHED)]
    #[serde(default)]
    pub(crate) log_unmatched: bool,
}

impl BuildPoisArgs {
    fn into_config(self) -> Result<BuildPoisConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(BuildPoisConfig::from(merged))
    }
}

/// Resolved `build-pois` configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BuildPoisConfig {
    pub(crate) layout: DataLayout,
    pub(crate) options: PoiJobOptions,
}

impl From<BuildPoisArgs> for BuildPoisConfig {
    fn from(args: BuildPoisArgs) -> Self {
        Self {
            layout: layout(args.data_dir, args.dist_dir),
            options: job_options(args.source_label, args.log_unmatched),
        }
    }
}

fn job_options(source_label: Option<String>, log_unmatched: bool) -> PoiJobOptions {
    PoiJobOptions::default()
        .with_source_label(source_label.unwrap_or_else(|| POI_SOURCE_LABEL.to_owned()))
        .with_matcher(MatcherOptions::default().with_log_unmatched(log_unmatched))
}

/// Fail early with a named field when a job input is missing.
fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match traildb_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::MissingSourceFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub(crate) fn check_inputs(layout: &DataLayout, options: &PoiJobOptions) -> Result<(), CliError> {
    require_existing(&layout.poi_schema(), ARG_POI_SCHEMA)?;
    require_existing(
        &layout.trail_collection(&options.source_label),
        ARG_TRAIL_COLLECTION,
    )
}

pub(super) fn run_update(args: UpdatePoisArgs) -> Result<(), CliError> {
    let config = args.into_config(Timestamp::now())?;
    check_inputs(&config.layout, &config.options)?;
    let schema = config.layout.load_poi_schema()?;
    let jobs = PoiJobs::new(&config.layout, &schema, &Spherical, config.options.clone());
    let trails = jobs.load_trails()?;
    let overpass = config.remote.client()?;
    block_on(jobs.update_poi_tiles(&overpass, &trails, config.remote.cutoff))??;
    Ok(())
}

pub(super) fn run_build(args: BuildPoisArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    check_inputs(&config.layout, &config.options)?;
    let schema = config.layout.load_poi_schema()?;
    let jobs = PoiJobs::new(&config.layout, &schema, &Spherical, config.options.clone());
    let trails = jobs.load_trails()?;
    jobs.build_trail_pois(&trails)?;
    Ok(())
}
