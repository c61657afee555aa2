//! POI schema, matching and GeoJSON output.

pub mod feature;
pub mod matcher;
pub mod schema;

pub use feature::{FeatureCollection, NUMERIC_TAGS, PoiFeature, TagValue};
pub use matcher::{
    MatchCounts, MatchOutcome, MatcherOptions, PoiMatcher, TrailPoiAccumulator, TrailPois,
    match_trail,
};
pub use schema::{DistanceThreshold, PoiSchema, PoiType, SchemaError, TagPredicate, TagTest};
