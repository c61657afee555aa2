//! Trail subcommands: register, update, recalculate and build.

use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use traildb_core::{ElementId, NewTrail, NoElevation, Spherical, Timestamp, TrailId};
use traildb_data::{
    DataLayout, StatusMachine, Throttle, TrailDatabase, TrailSync, build_trail_collections,
};

use crate::{
    ARG_COLOR, ARG_CUTOFF, ARG_DATA_DIR, ARG_DIST_DIR, ARG_ENDPOINT, ARG_MAX_RETRIES,
    ARG_PAUSE_SECS, ARG_RATE_LIMIT_PAUSE_SECS, ARG_RELATION, ARG_TIMEOUT_SECS, ARG_TRAIL_ID,
    ARG_TRAIL_NAME, ARG_USER_AGENT, ARG_WIKIDATA, CliError, ENV_RELATION, ENV_TRAIL_ID,
    ENV_TRAIL_NAME, block_on, layout,
    remote::{RemoteConfig, RemoteOptions},
};

/// CLI arguments for the `register` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(about = "Add a trail to the index")]
#[ortho_config(prefix = "TRAILDB")]
pub(crate) struct RegisterArgs {
    /// Index id of the trail.
    #[arg(long = ARG_TRAIL_ID, value_name = "id")]
    #[serde(default)]
    pub(crate) id: Option<String>,
    /// Display name.
    #[arg(long = ARG_TRAIL_NAME, value_name = "name")]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// OpenStreetMap id of the route relation.
    #[arg(long = ARG_RELATION, value_name = "id")]
    #[serde(default)]
    pub(crate) relation: Option<u64>,
    /// Display colour.
    #[arg(long = ARG_COLOR, value_name = "colour")]
    #[serde(default)]
    pub(crate) color: Option<String>,
    /// Wikidata item, e.g. `Q1234`.
    #[arg(long = ARG_WIKIDATA, value_name = "item")]
    #[serde(default)]
    pub(crate) wikidata: Option<String>,
    /// Directory holding the index and snapshots.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
}

impl RegisterArgs {
    fn into_config(self) -> Result<RegisterConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        RegisterConfig::try_from(merged)
    }
}

/// Resolved `register` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RegisterConfig {
    pub(crate) layout: DataLayout,
    pub(crate) trail: NewTrail,
}

impl TryFrom<RegisterArgs> for RegisterConfig {
    type Error = CliError;

    fn try_from(args: RegisterArgs) -> Result<Self, Self::Error> {
        let id = args.id.ok_or(CliError::MissingArgument {
            field: ARG_TRAIL_ID,
            env: ENV_TRAIL_ID,
        })?;
        let name = args.name.ok_or(CliError::MissingArgument {
            field: ARG_TRAIL_NAME,
            env: ENV_TRAIL_NAME,
        })?;
        let relation = args.relation.ok_or(CliError::MissingArgument {
            field: ARG_RELATION,
            env: ENV_RELATION,
        })?;
        Ok(Self {
            layout: layout(args.data_dir, None),
            trail: NewTrail {
                id: TrailId::from(id.as_str()),
                name,
                color: args.color,
                relation: ElementId::relation(relation),
                wikidata: args.wikidata,
            },
        })
    }
}

/// CLI arguments for `update-trails`.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Import trails that were never synchronised, ask Overpass \
                 which relations changed since each trail was last checked \
                 and re-download those, then roll every record forward to \
                 the cutoff.",
    about = "Synchronise trails with Overpass"
)]
#[ortho_config(prefix = "TRAILDB")]
pub(crate) struct UpdateTrailsArgs {
    /// Directory holding the index and snapshots.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
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
    /// Pause between relation downloads in seconds (default 20).
    #[arg(long = ARG_PAUSE_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) pause_secs: Option<u64>,
    /// Pause after a rate-limited request in seconds (default 10).
    #[arg(long = ARG_RATE_LIMIT_PAUSE_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) rate_limit_pause_secs: Option<u64>,
    /// Retries per request (default 10).
    #[arg(long = ARG_MAX_RETRIES, value_name = "count")]
    #[serde(default)]
    pub(crate) max_retries: Option<u32>,
    /// Run cutoff; defaults to the start of yesterday (UTC).
    #[arg(long = ARG_CUTOFF, value_name = "date")]
    #[serde(default)]
    pub(crate) cutoff: Option<String>,
}

impl UpdateTrailsArgs {
    fn into_config(self, now: Timestamp) -> Result<UpdateTrailsConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        UpdateTrailsConfig::resolve(merged, now)
    }
}

/// Resolved `update-trails` configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpdateTrailsConfig {
    pub(crate) layout: DataLayout,
    pub(crate) remote: RemoteConfig,
}

impl UpdateTrailsConfig {
    pub(crate) fn resolve(args: UpdateTrailsArgs, now: Timestamp) -> Result<Self, CliError> {
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
            layout: layout(args.data_dir, None),
            remote: RemoteConfig::resolve(options, Throttle::for_trails(), now)?,
        })
    }
}

/// CLI arguments for the jobs that only touch local artifacts.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[ortho_config(prefix = "TRAILDB")]
pub(crate) struct LocalArgs {
    /// Directory holding the index and snapshots.
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
    /// Directory receiving the built collections.
    #[arg(long = ARG_DIST_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) dist_dir: Option<Utf8PathBuf>,
}

impl LocalArgs {
    fn into_layout(self) -> Result<DataLayout, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        Ok(layout(merged.data_dir, merged.dist_dir))
    }
}

pub(super) fn run_register(args: RegisterArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let mut db = TrailDatabase::create_or_open(config.layout)?;
    db.register(config.trail)?;
    db.save_index()?;
    Ok(())
}

pub(super) fn run_update(args: UpdateTrailsArgs) -> Result<(), CliError> {
    let config = args.into_config(Timestamp::now())?;
    let mut db = TrailDatabase::open(config.layout)?;
    let overpass = config.remote.client()?;
    let sync = TrailSync::new(&overpass, &NoElevation);
    block_on(sync.update_trails(&mut db, config.remote.cutoff))??;
    info!("{} requests issued", overpass.requests_issued());
    Ok(())
}

pub(super) fn run_recalculate(args: LocalArgs) -> Result<(), CliError> {
    let mut db = TrailDatabase::open(args.into_layout()?)?;
    StatusMachine::new(&NoElevation).recalculate_stats(&mut db)?;
    Ok(())
}

pub(super) fn run_build(args: LocalArgs) -> Result<(), CliError> {
    let db = TrailDatabase::open(args.into_layout()?)?;
    build_trail_collections(&db, &Spherical)?;
    Ok(())
}
