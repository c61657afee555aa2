//! Trail collection build: one simplified GeoJSON collection per tolerance.

use geo::{Coord, LineString};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use traildb_core::{FeatureCollection, GeometryOps, Timestamp, TrailId, TrailRecord, TrailStatus};

use crate::store::{DataLayout, JsonStyle, StoreError, TrailDatabase, read_json, write_json};

/// Simplification tolerance and the label used in the output file name.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Tolerance in degrees.
    pub degrees: f64,
    /// File name label, e.g. `002` for `traildb-002.json`.
    pub label: &'static str,
}

/// Tolerances every build writes.
pub const TOLERANCES: [Tolerance; 3] = [
    Tolerance {
        degrees: 0.0001,
        label: "0001",
    },
    Tolerance {
        degrees: 0.002,
        label: "002",
    },
    Tolerance {
        degrees: 0.005,
        label: "005",
    },
];

/// Collection the POI jobs read trail lines from.
pub const POI_SOURCE_LABEL: &str = "002";

/// Errors raised while building trail collections.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// Reading a snapshot or writing a collection failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The index has no trails to build.
    #[error("the trail index at {path} is empty")]
    EmptyIndex {
        /// Index path.
        path: camino::Utf8PathBuf,
    },
}

/// GeoJSON feature of one trail: its index record and route line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeature", into = "RawFeature")]
pub struct TrailFeature {
    /// Index record.
    pub properties: TrailRecord,
    /// Route line; empty for unroutable trails.
    pub line: LineString,
}

impl TrailFeature {
    /// Trail id.
    #[must_use]
    pub fn id(&self) -> &TrailId {
        &self.properties.id
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
struct RawFeature {
    id: TrailId,
    properties: TrailRecord,
    geometry: RawLine,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename = "LineString")]
struct RawLine {
    coordinates: Vec<[f64; 2]>,
}

impl From<TrailFeature> for RawFeature {
    fn from(feature: TrailFeature) -> Self {
        Self {
            id: feature.properties.id.clone(),
            properties: feature.properties,
            geometry: RawLine {
                coordinates: feature.line.coords().map(|coord| [coord.x, coord.y]).collect(),
            },
        }
    }
}

impl TryFrom<RawFeature> for TrailFeature {
    type Error = String;

    fn try_from(raw: RawFeature) -> Result<Self, Self::Error> {
        if raw.id != raw.properties.id {
            return Err(format!(
                "feature id {} does not match record id {}",
                raw.id, raw.properties.id
            ));
        }
        let line = raw
            .geometry
            .coordinates
            .into_iter()
            .map(|[x, y]| Coord { x, y })
            .collect();
        Ok(Self {
            properties: raw.properties,
            line,
        })
    }
}

/// Trail counts per status and the most recent check date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Count per status, in [`TrailStatus::ALL`] order.
    pub counts: Vec<(TrailStatus, usize)>,
    /// Latest check date across the index.
    pub checked: Option<Timestamp>,
}

impl BuildReport {
    fn tally(trails: &[TrailRecord]) -> Self {
        let counts = TrailStatus::ALL
            .iter()
            .map(|&status| {
                let count = trails.iter().filter(|trail| trail.status() == status).count();
                (status, count)
            })
            .collect();
        let checked = trails.iter().filter_map(TrailRecord::checked_date).max();
        Self { counts, checked }
    }
}

/// Build every trail collection of `db`.
///
/// Broken trails keep the line of their last good snapshot.
pub fn build_trail_collections(
    db: &TrailDatabase,
    geometry: &dyn GeometryOps,
) -> Result<BuildReport, BuildError> {
    if db.trails().is_empty() {
        return Err(BuildError::EmptyIndex {
            path: db.layout().index_path(),
        });
    }
    let mut features = Vec::with_capacity(db.trails().len());
    for trail in db.trails() {
        let line = if trail.status() == TrailStatus::Unroutable {
            LineString::new(Vec::new())
        } else {
            db.load_route(trail)?.analysis.into_line()
        };
        features.push(TrailFeature {
            properties: trail.clone(),
            line,
        });
    }

    for tolerance in TOLERANCES {
        let simplified: Vec<TrailFeature> = features
            .iter()
            .map(|feature| TrailFeature {
                properties: feature.properties.clone(),
                line: geometry.simplify(&feature.line, tolerance.degrees),
            })
            .collect();
        let path = db.layout().trail_collection(tolerance.label);
        write_json(&path, &FeatureCollection::new(simplified), JsonStyle::Compact)?;
    }

    let report = BuildReport::tally(db.trails());
    let summary = report
        .counts
        .iter()
        .map(|(status, count)| format!("{count} {status}"))
        .collect::<Vec<_>>()
        .join(", ");
    info!(
        "[{}] [trails] [build] {summary}",
        report
            .checked
            .map_or_else(|| "-".to_owned(), |at| at.into_inner().format("%Y-%m-%d").to_string())
    );
    Ok(report)
}

/// Read a built trail collection.
pub fn load_trail_collection(
    layout: &DataLayout,
    label: &str,
) -> Result<Vec<TrailFeature>, StoreError> {
    read_json::<FeatureCollection<TrailFeature>>(&layout.trail_collection(label))
        .map(|collection| collection.features)
}
