//! Facade crate for the trail database.
//!
//! This crate re-exports the core domain types and, behind the `data`
//! feature, the storage, synchronisation and build jobs.

#![forbid(unsafe_code)]

pub use traildb_core::{
    CorridorOptions, Element, ElementId, GeometryOps, PoiMatcher, PoiSchema, Spherical, Tile,
    TileSet, Timestamp, TrailId, TrailRecord, TrailStatus, corridor_tiles,
};

#[cfg(feature = "data")]
pub use traildb_data::{
    DataLayout, Overpass, PoiJobs, StatusMachine, TrailDatabase, TrailSync, detect_changes,
};
