//! Matching of tile elements against a trail.
//!
//! Tiles of one trail are scanned independently (and in parallel by the data
//! layer); each scan feeds a [`TrailPoiAccumulator`] and the partial results
//! are combined in tile order.

use std::collections::BTreeMap;

use geo::LineString;
use log::debug;

use super::{
    feature::PoiFeature,
    schema::{PoiSchema, PoiType},
};
use crate::{
    element::{Element, ElementId},
    geometry::GeometryOps,
    trail::TrailStatus,
};

/// Matcher behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatcherOptions {
    /// Log every element no schema type accepts, at debug level.
    pub log_unmatched: bool,
}

impl MatcherOptions {
    /// Enable or disable logging of unmatched elements.
    #[must_use]
    pub const fn with_log_unmatched(mut self, enabled: bool) -> Self {
        self.log_unmatched = enabled;
        self
    }
}

/// Result of matching one element against a trail.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Within the type's threshold.
    Accepted(PoiFeature),
    /// Classified, but farther than the threshold.
    TooFar {
        /// Matched type.
        poi_type: String,
        /// Measured distance in metres.
        distance_m: f64,
    },
    /// No schema type accepts the element.
    Unmatched,
    /// Per-value threshold has no entry for the element's value.
    NoThreshold {
        /// Matched type.
        poi_type: String,
    },
    /// The element has neither a position nor a centre.
    NoLocation,
}

/// Classifies and distance-filters elements for one trail line.
#[derive(Clone, Copy)]
pub struct PoiMatcher<'a> {
    schema: &'a PoiSchema,
    geometry: &'a dyn GeometryOps,
    line: &'a LineString,
    options: MatcherOptions,
}

impl<'a> PoiMatcher<'a> {
    /// Build a matcher for `line`.
    #[must_use]
    pub fn new(
        schema: &'a PoiSchema,
        geometry: &'a dyn GeometryOps,
        line: &'a LineString,
        options: MatcherOptions,
    ) -> Self {
        Self {
            schema,
            geometry,
            line,
            options,
        }
    }

    /// Classify `element` and check its distance to the trail.
    #[must_use]
    pub fn match_element(&self, element: &Element) -> MatchOutcome {
        let Some(poi_type) = self.schema.classify(element) else {
            if self.options.log_unmatched {
                debug!("{} matches no POI type", element.element_id());
            }
            return MatchOutcome::Unmatched;
        };
        let Some(threshold) = poi_type.threshold_for(element) else {
            debug!(
                "{} has no {} threshold for its value",
                element.element_id(),
                poi_type.name
            );
            return MatchOutcome::NoThreshold {
                poi_type: poi_type.name.clone(),
            };
        };
        let Some(location) = element.representative_point() else {
            return MatchOutcome::NoLocation;
        };
        let distance_m = self.geometry.point_to_line_distance(location, self.line);
        if distance_m <= threshold {
            MatchOutcome::Accepted(PoiFeature::new(element, location, &poi_type.name, distance_m))
        } else {
            MatchOutcome::TooFar {
                poi_type: poi_type.name.clone(),
                distance_m,
            }
        }
    }

    /// Fresh accumulator for a scan.
    #[must_use]
    pub fn accumulator(&self) -> TrailPoiAccumulator {
        TrailPoiAccumulator::default()
    }

    /// Match every element of `elements` into a fresh accumulator.
    pub fn scan<I>(&self, elements: I) -> TrailPoiAccumulator
    where
        I: IntoIterator<Item = Element>,
    {
        let mut accumulator = self.accumulator();
        for element in elements {
            accumulator.process_element(self, &element);
        }
        accumulator
    }
}

/// Partial match result of one or more tiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailPoiAccumulator {
    features: BTreeMap<ElementId, PoiFeature>,
    unmatched: u64,
    rejected: u64,
}

impl TrailPoiAccumulator {
    /// Match one element and record the outcome.
    pub fn process_element(&mut self, matcher: &PoiMatcher<'_>, element: &Element) {
        match matcher.match_element(element) {
            MatchOutcome::Accepted(feature) => {
                self.features.entry(feature.id).or_insert(feature);
            }
            MatchOutcome::Unmatched => self.unmatched += 1,
            MatchOutcome::TooFar { .. }
            | MatchOutcome::NoThreshold { .. }
            | MatchOutcome::NoLocation => self.rejected += 1,
        }
    }

    /// Merge another partial result; features already present win.
    #[must_use]
    pub fn combine(mut self, other: Self) -> Self {
        for (id, feature) in other.features {
            self.features.entry(id).or_insert(feature);
        }
        self.unmatched += other.unmatched;
        self.rejected += other.rejected;
        self
    }

    /// Finish the trail: features ordered by element id plus per-type counts.
    #[must_use]
    pub fn into_report(self, schema: &PoiSchema) -> TrailPois {
        let features: Vec<PoiFeature> = self.features.into_values().collect();
        let counts = MatchCounts::tally(schema, &features, self.unmatched, self.rejected);
        TrailPois { features, counts }
    }
}

/// Per-type match counts of one trail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCounts {
    /// Accepted features per type, in schema order, zeros included.
    pub per_type: Vec<(String, u64)>,
    /// Elements no type accepted.
    pub unmatched: u64,
    /// Classified elements rejected by distance, threshold or location.
    pub rejected: u64,
}

impl MatchCounts {
    fn tally(schema: &PoiSchema, features: &[PoiFeature], unmatched: u64, rejected: u64) -> Self {
        let per_type = schema
            .types()
            .iter()
            .map(|poi_type: &PoiType| {
                let count = features
                    .iter()
                    .filter(|feature| feature.poi_type == poi_type.name)
                    .count();
                (poi_type.name.clone(), u64::try_from(count).unwrap_or(u64::MAX))
            })
            .collect();
        Self {
            per_type,
            unmatched,
            rejected,
        }
    }

    /// Total accepted features.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.per_type.iter().map(|(_, count)| count).sum()
    }
}

/// POIs of one trail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailPois {
    /// Accepted features ordered by element id.
    pub features: Vec<PoiFeature>,
    /// Diagnostics.
    pub counts: MatchCounts,
}

impl TrailPois {
    /// Output for a trail that is not matched at all.
    #[must_use]
    pub fn empty(schema: &PoiSchema) -> Self {
        TrailPoiAccumulator::default().into_report(schema)
    }
}

/// Match a trail from its per-tile scans.
///
/// `scan_tiles` returns one partial result per tile, in tile order, and is
/// only called for trails that can be matched: unroutable trails
/// short-circuit to an empty result without reading any tile.
pub fn match_trail<F, E>(
    matcher: &PoiMatcher<'_>,
    status: TrailStatus,
    scan_tiles: F,
) -> Result<TrailPois, E>
where
    F: FnOnce(&PoiMatcher<'_>) -> Result<Vec<TrailPoiAccumulator>, E>,
{
    if status == TrailStatus::Unroutable {
        return Ok(TrailPois::empty(matcher.schema));
    }
    Ok(scan_tiles(matcher)?
        .into_iter()
        .fold(TrailPoiAccumulator::default(), TrailPoiAccumulator::combine)
        .into_report(matcher.schema))
}

impl PoiMatcher<'_> {
    /// Schema the matcher classifies against.
    #[must_use]
    pub const fn schema(&self) -> &PoiSchema {
        self.schema
    }
}
