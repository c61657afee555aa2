//! Core domain types for the trail database.
//!
//! Everything here is pure: element identifiers, the fixed-zoom tile scheme
//! and corridor indexer, trail records with their derived status, route
//! assembly and the POI matcher. Reading and writing artifacts or talking to
//! the remote map service lives in `traildb-data`.

#![forbid(unsafe_code)]

pub mod element;
pub mod elevation;
pub mod geometry;
pub mod poi;
pub mod route;
pub mod tile;
pub mod timestamp;
pub mod trail;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use element::{
    Element, ElementId, ElementIdError, ElementKind, ElementMeta, LatLon, Member, Tags,
};
pub use elevation::{ElevationError, ElevationSource, NoElevation, climb};
pub use geometry::{GeometryOps, Spherical};
pub use poi::{
    FeatureCollection, MatchOutcome, MatcherOptions, PoiFeature, PoiMatcher, PoiSchema, PoiType,
    TrailPois,
};
pub use route::{RouteAnalysis, RouteBuilder};
pub use tile::{CorridorOptions, POI_ZOOM, Quadkey, QuadkeyError, Tile, TileSet, corridor_tiles};
pub use timestamp::{Timestamp, TimestampError};
pub use trail::{NewTrail, TrailId, TrailRecord, TrailStats, TrailStatus};
