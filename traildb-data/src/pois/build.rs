use log::info;
use rayon::prelude::*;
use traildb_core::{
    FeatureCollection, PoiMatcher, Timestamp, TrailPois, corridor_tiles,
    poi::{TrailPoiAccumulator, match_trail},
};

use super::{PoiBuildReport, PoiJobError, PoiJobs, TrailPoiSummary, day};
use crate::{
    build::TrailFeature,
    store::{ArtifactHeader, JsonStyle, StoreError, stream_elements, write_json},
};

impl PoiJobs<'_> {
    /// Match cached tile contents against every trail and write one POI
    /// collection per trail.
    ///
    /// Tiles of one trail are scanned in parallel and merged; unroutable
    /// trails get an empty collection without reading any tile. A tile
    /// missing from the cache fails the build.
    pub fn build_trail_pois(&self, trails: &[TrailFeature]) -> Result<PoiBuildReport, PoiJobError> {
        let mut report = PoiBuildReport::default();
        for trail in trails {
            let (pois, captured) = self.scan_trail(trail)?;
            if report.capture_timestamp.is_none() {
                report.capture_timestamp = captured;
            }
            write_json(
                &self.layout.trail_pois(trail.id()),
                &FeatureCollection::new(pois.features),
                JsonStyle::Compact,
            )?;
            let summary = TrailPoiSummary {
                id: trail.id().clone(),
                counts: pois.counts,
            };
            info!("[{}] [poi] [build] {summary}", day(report.capture_timestamp));
            report.trails.push(summary);
        }

        info!(
            "[{}] [poi] [build] {} trails {} poi",
            day(report.capture_timestamp),
            report.trails.len(),
            report.total()
        );
        Ok(report)
    }

    fn scan_trail(
        &self,
        trail: &TrailFeature,
    ) -> Result<(TrailPois, Option<Timestamp>), StoreError> {
        let matcher = PoiMatcher::new(self.schema, self.geometry, &trail.line, self.options.matcher);
        let mut captured = None;
        let pois = match_trail(&matcher, trail.properties.status(), |matcher| {
            let tiles = corridor_tiles(self.geometry, &trail.line, self.options.corridor);
            let scanned = tiles
                .par_iter()
                .map(|tile| {
                    let mut accumulator = matcher.accumulator();
                    let header = stream_elements(&self.layout.poi_tile(*tile), |element| {
                        accumulator.process_element(matcher, &element);
                    })?;
                    Ok((accumulator, header))
                })
                .collect::<Result<Vec<(TrailPoiAccumulator, ArtifactHeader)>, StoreError>>()?;
            captured = scanned
                .first()
                .and_then(|(_, header)| header.capture_timestamp);
            Ok(scanned.into_iter().map(|(accumulator, _)| accumulator).collect())
        })?;
        Ok((pois, captured))
    }
}
