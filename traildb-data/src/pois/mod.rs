//! POI jobs: refreshing the tile cache and matching POIs per trail.
//!
//! Both jobs read trail lines from a built trail collection rather than the
//! raw snapshots, so they see exactly the geometry that was published.

mod build;
mod update;

use std::fmt;

use log::debug;
use thiserror::Error;
use traildb_core::{
    CorridorOptions, GeometryOps, MatcherOptions, PoiSchema, Timestamp, TrailId, poi::MatchCounts,
};

use crate::{
    build::{POI_SOURCE_LABEL, TrailFeature, load_trail_collection},
    overpass::OverpassError,
    store::{DataLayout, StoreError},
};

/// Errors raised by the POI jobs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoiJobError {
    /// A tile download failed.
    #[error(transparent)]
    Overpass(#[from] OverpassError),
    /// A collection, tile or output could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables shared by both jobs.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiJobOptions {
    /// Corridor used to select tiles.
    pub corridor: CorridorOptions,
    /// Matcher behaviour.
    pub matcher: MatcherOptions,
    /// Label of the trail collection supplying the lines.
    pub source_label: String,
}

impl Default for PoiJobOptions {
    fn default() -> Self {
        Self {
            corridor: CorridorOptions::default(),
            matcher: MatcherOptions::default(),
            source_label: POI_SOURCE_LABEL.to_owned(),
        }
    }
}

impl PoiJobOptions {
    /// Read lines from the collection labelled `label`.
    #[must_use]
    pub fn with_source_label(mut self, label: impl Into<String>) -> Self {
        self.source_label = label.into();
        self
    }

    /// Override the matcher options.
    #[must_use]
    pub const fn with_matcher(mut self, matcher: MatcherOptions) -> Self {
        self.matcher = matcher;
        self
    }
}

/// Outcome of a tile refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoiUpdateReport {
    /// Tiles downloaded.
    pub tiles: usize,
}

/// Match counts of one trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailPoiSummary {
    /// Trail id.
    pub id: TrailId,
    /// Per-type counts.
    pub counts: MatchCounts,
}

/// One-line count summary, e.g. `gr5: water 1, shelter 0 (2 unmatched, 1 rejected)`.
impl fmt::Display for TrailPoiSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.id)?;
        for (position, (name, count)) in self.counts.per_type.iter().enumerate() {
            let separator = if position == 0 { " " } else { ", " };
            write!(f, "{separator}{name} {count}")?;
        }
        write!(
            f,
            " ({} unmatched, {} rejected)",
            self.counts.unmatched, self.counts.rejected
        )
    }
}

/// Outcome of a POI build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoiBuildReport {
    /// Capture timestamp of the first tile read.
    pub capture_timestamp: Option<Timestamp>,
    /// Per-trail counts, in collection order.
    pub trails: Vec<TrailPoiSummary>,
}

impl PoiBuildReport {
    /// Accepted POIs across all trails.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.trails.iter().map(|trail| trail.counts.total()).sum()
    }
}

/// Shared context of the POI jobs.
pub struct PoiJobs<'a> {
    layout: &'a DataLayout,
    schema: &'a PoiSchema,
    geometry: &'a dyn GeometryOps,
    options: PoiJobOptions,
}

impl<'a> PoiJobs<'a> {
    /// Jobs reading and writing below `layout`.
    pub fn new(
        layout: &'a DataLayout,
        schema: &'a PoiSchema,
        geometry: &'a dyn GeometryOps,
        options: PoiJobOptions,
    ) -> Self {
        Self {
            layout,
            schema,
            geometry,
            options,
        }
    }

    /// Trails of the configured source collection.
    pub fn load_trails(&self) -> Result<Vec<TrailFeature>, StoreError> {
        let trails = load_trail_collection(self.layout, &self.options.source_label)?;
        debug!(
            "loaded {} trails from collection {}",
            trails.len(),
            self.options.source_label
        );
        Ok(trails)
    }
}

fn day(at: Option<Timestamp>) -> String {
    at.map_or_else(
        || "-".to_owned(),
        |at| at.into_inner().format("%Y-%m-%d").to_string(),
    )
}
