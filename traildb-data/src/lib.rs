//! Storage, remote synchronisation and build jobs for the trail database.
//!
//! Responsibilities:
//! - Lay out and read the on-disk artifacts: index, snapshots, POI tiles,
//!   distribution collections.
//! - Talk to the Overpass API with pacing, retries and freshness checks.
//! - Run the batch jobs: trail sync and update, statistics recalculation,
//!   trail collection build, POI tile refresh and POI build.
//!
//! Boundaries:
//! - Domain rules (status derivation, route assembly, matching) live in
//!   `traildb-core`.
//! - Jobs run on a single-threaded async runtime; only the POI build fans
//!   out across threads.

#![forbid(unsafe_code)]

pub mod build;
pub mod changes;
pub mod overpass;
pub mod pois;
pub mod store;
pub mod sync;
pub mod test_support;

pub use build::{
    BuildError, BuildReport, POI_SOURCE_LABEL, TOLERANCES, Tolerance, TrailFeature,
    build_trail_collections, load_trail_collection,
};
pub use changes::{ChangeError, Changes, ElementIndex, detect_changes};
pub use overpass::{
    HttpOverpassConfig, HttpOverpassSource, Overpass, OverpassError, OverpassQuery,
    OverpassSource, Throttle, TransportError,
};
pub use pois::{
    PoiBuildReport, PoiJobError, PoiJobOptions, PoiJobs, PoiUpdateReport, TrailPoiSummary,
};
pub use store::{DataLayout, Snapshot, StoreError, StoredRoute, TrailDatabase};
pub use sync::{StatusMachine, SyncError, SyncOutcome, TrailSync, UpdateReport};
