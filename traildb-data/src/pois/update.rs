use log::{debug, info};
use traildb_core::{Timestamp, TileSet};

use super::{PoiJobError, PoiJobs, PoiUpdateReport, day};
use crate::{
    build::TrailFeature,
    overpass::{Overpass, OverpassQuery, OverpassSource},
    store::{JsonStyle, PoiTile, write_json},
};

impl PoiJobs<'_> {
    /// Download every tile touched by a trail corridor, as of `cutoff`.
    ///
    /// Tiles are fetched one after another with the client's pacing. A tile
    /// whose data predates the cutoff is re-requested; a tile that never
    /// catches up aborts the run. Way node lists are dropped before the tile
    /// is written since the matcher only needs positions and tags.
    pub async fn update_poi_tiles<S: OverpassSource>(
        &self,
        overpass: &Overpass<S>,
        trails: &[TrailFeature],
        cutoff: Timestamp,
    ) -> Result<PoiUpdateReport, PoiJobError> {
        let mut tiles = TileSet::new();
        for trail in trails.iter().filter(|trail| !trail.line.0.is_empty()) {
            tiles.insert_corridor(self.geometry, &trail.line, self.options.corridor);
        }
        let tiles = tiles.into_sorted();
        debug!("{} trails touch {} tiles", trails.len(), tiles.len());

        for (done, tile) in tiles.iter().enumerate() {
            let query = OverpassQuery::poi_tile(*tile, self.schema, cutoff);
            let response = overpass.query_fresh(&query, cutoff).await?;
            let mut elements = response.elements;
            for element in &mut elements {
                element.nodes.clear();
            }
            debug!(
                "tile {tile} ({}/{}): {} elements",
                done + 1,
                tiles.len(),
                elements.len()
            );
            let artifact = PoiTile {
                capture_timestamp: cutoff,
                base_timestamp: response.base_timestamp,
                elements,
            };
            write_json(&self.layout.poi_tile(*tile), &artifact, JsonStyle::Compact)?;
        }

        info!("[{}] [poi] [update] {} tiles", day(Some(cutoff)), tiles.len());
        Ok(PoiUpdateReport { tiles: tiles.len() })
    }
}
