//! Error types emitted by the traildb CLI.
//!
//! Job errors are boxed where they are large so `Result<_, CliError>` stays
//! small.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use traildb_core::TimestampError;
use traildb_data::{BuildError, PoiJobError, StoreError, SyncError, TransportError};

/// Errors emitted by the traildb CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The cutoff option is not a date or RFC 3339 timestamp.
    #[error("invalid cutoff: {0}")]
    InvalidCutoff(#[from] TimestampError),
    /// A required input file does not exist.
    #[error("{field} path {path:?} does not exist or is not a file")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// An input path could not be inspected.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The async runtime could not be started.
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The Overpass client could not be built.
    #[error("failed to set up the Overpass client: {0}")]
    Overpass(#[from] TransportError),
    /// Reading or writing the database failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A trail update or recalculation failed.
    #[error("trail synchronisation failed: {0}")]
    Sync(#[source] Box<SyncError>),
    /// Building the trail collections failed.
    #[error("trail build failed: {0}")]
    Build(#[source] Box<BuildError>),
    /// A POI job failed.
    #[error("POI job failed: {0}")]
    Poi(#[source] Box<PoiJobError>),
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        Self::Sync(Box::new(err))
    }
}

impl From<BuildError> for CliError {
    fn from(err: BuildError) -> Self {
        Self::Build(Box::new(err))
    }
}

impl From<PoiJobError> for CliError {
    fn from(err: PoiJobError) -> Self {
        Self::Poi(Box::new(err))
    }
}
