//! The trail index and the artifacts stored next to it.
//!
//! Layout below the data directory:
//!
//! - `db.json`: the trail index, pretty-printed and sorted by trail id.
//! - `trails/<id>.json`: the last stored relation snapshot of each trail.
//! - `poi/<z>/<x>/<y>.json`: cached POI candidates per tile.
//! - `poi-schema.json`: the POI schema.
//!
//! Build outputs go below the dist directory: `traildb-<tolerance>.json`
//! and `poi/<id>.json`.

mod artifact;

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use thiserror::Error;
use traildb_core::{
    Element, ElementId, NewTrail, PoiSchema, RouteAnalysis, RouteBuilder, Tile, Timestamp, TrailId,
    TrailRecord,
};

pub use artifact::{ArtifactHeader, PoiTile, Snapshot, stream_elements};
pub(crate) use artifact::{JsonStyle, read_json, write_json};

/// Errors raised while reading or writing stored artifacts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// An artifact could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Artifact path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// An artifact could not be created.
    #[error("failed to create {path}: {source}")]
    Create {
        /// Artifact path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// An artifact is not valid JSON of the expected shape.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Artifact path.
        path: Utf8PathBuf,
        /// Parser error.
        source: serde_json::Error,
    },
    /// Serialising an artifact failed.
    #[error("failed to write {path}: {source}")]
    Write {
        /// Artifact path.
        path: Utf8PathBuf,
        /// Serialiser error.
        source: serde_json::Error,
    },
    /// Flushing a written artifact failed.
    #[error("failed to flush {path}: {source}")]
    Flush {
        /// Artifact path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A trail with the same id is already registered.
    #[error("trail {id} is already registered")]
    DuplicateTrail {
        /// Offending id.
        id: TrailId,
    },
    /// No trail index exists at the expected path.
    #[error("no trail index at {path}; register a trail first")]
    MissingIndex {
        /// Index path.
        path: Utf8PathBuf,
    },
    /// The index has no trail with this id.
    #[error("trail {id} is not in the index")]
    UnknownTrail {
        /// Requested id.
        id: TrailId,
    },
}

/// Where the database keeps its artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    data_dir: Utf8PathBuf,
    dist_dir: Utf8PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("data", "dist")
    }
}

impl DataLayout {
    /// Layout rooted at the given data and dist directories.
    pub fn new(data_dir: impl Into<Utf8PathBuf>, dist_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            dist_dir: dist_dir.into(),
        }
    }

    /// Directory holding the index, snapshots and tiles.
    #[must_use]
    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    /// Directory receiving build outputs.
    #[must_use]
    pub fn dist_dir(&self) -> &Utf8Path {
        &self.dist_dir
    }

    /// Trail index.
    #[must_use]
    pub fn index_path(&self) -> Utf8PathBuf {
        self.data_dir.join("db.json")
    }

    /// Stored relation snapshot of a trail.
    #[must_use]
    pub fn trail_snapshot(&self, id: &TrailId) -> Utf8PathBuf {
        self.data_dir.join("trails").join(format!("{id}.json"))
    }

    /// Cached POI candidates of a tile.
    #[must_use]
    pub fn poi_tile(&self, tile: Tile) -> Utf8PathBuf {
        self.data_dir.join("poi").join(format!("{tile}.json"))
    }

    /// POI schema.
    #[must_use]
    pub fn poi_schema(&self) -> Utf8PathBuf {
        self.data_dir.join("poi-schema.json")
    }

    /// Trail collection simplified with the tolerance labelled `label`.
    #[must_use]
    pub fn trail_collection(&self, label: &str) -> Utf8PathBuf {
        self.dist_dir.join(format!("traildb-{label}.json"))
    }

    /// POI collection of a trail.
    #[must_use]
    pub fn trail_pois(&self, id: &TrailId) -> Utf8PathBuf {
        self.dist_dir.join("poi").join(format!("{id}.json"))
    }

    /// Load the POI schema.
    pub fn load_poi_schema(&self) -> Result<PoiSchema, StoreError> {
        read_json(&self.poi_schema())
    }
}

/// Route rebuilt from a stored snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRoute {
    /// Assembled route.
    pub analysis: RouteAnalysis,
    /// Capture timestamp recorded in the snapshot.
    pub capture_timestamp: Option<Timestamp>,
}

/// The trail index together with the per-trail snapshots it points at.
///
/// Mutations only touch memory; [`TrailDatabase::save_index`] persists them.
/// Long runs call it after every trail so an interrupted run keeps the work
/// done so far.
#[derive(Debug)]
pub struct TrailDatabase {
    layout: DataLayout,
    trails: Vec<TrailRecord>,
}

fn index_exists(path: &Utf8Path) -> Result<bool, StoreError> {
    traildb_fs::file_is_file(path).map_err(|source| StoreError::Open {
        path: path.to_owned(),
        source,
    })
}

impl TrailDatabase {
    /// Open the index of `layout`.
    ///
    /// # Errors
    /// [`StoreError::MissingIndex`] when there is no index file, so a
    /// mistyped data directory fails instead of syncing zero trails.
    pub fn open(layout: DataLayout) -> Result<Self, StoreError> {
        let path = layout.index_path();
        if !index_exists(&path)? {
            return Err(StoreError::MissingIndex { path });
        }
        let trails = read_json(&path)?;
        Ok(Self { layout, trails })
    }

    /// Open the index of `layout`, starting empty when none exists yet.
    /// Only registration may create a database.
    pub fn create_or_open(layout: DataLayout) -> Result<Self, StoreError> {
        let path = layout.index_path();
        if index_exists(&path)? {
            return Self::open(layout);
        }
        debug!("no index at {path}; starting empty");
        Ok(Self {
            layout,
            trails: Vec::new(),
        })
    }

    /// Artifact locations.
    #[must_use]
    pub const fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Every record, in index order.
    #[must_use]
    pub fn trails(&self) -> &[TrailRecord] {
        &self.trails
    }

    /// Every record, mutably.
    pub fn trails_mut(&mut self) -> &mut [TrailRecord] {
        &mut self.trails
    }

    /// Ids of every record, in index order.
    #[must_use]
    pub fn trail_ids(&self) -> Vec<TrailId> {
        self.trails.iter().map(|trail| trail.id.clone()).collect()
    }

    /// Record by id.
    pub fn get(&self, id: &TrailId) -> Result<&TrailRecord, StoreError> {
        self.trails
            .iter()
            .find(|trail| &trail.id == id)
            .ok_or_else(|| StoreError::UnknownTrail { id: id.clone() })
    }

    /// Record by id, mutably.
    pub fn get_mut(&mut self, id: &TrailId) -> Result<&mut TrailRecord, StoreError> {
        self.trails
            .iter_mut()
            .find(|trail| &trail.id == id)
            .ok_or_else(|| StoreError::UnknownTrail { id: id.clone() })
    }

    /// Add a trail with no dates and no stats.
    pub fn register(&mut self, trail: NewTrail) -> Result<(), StoreError> {
        if self.trails.iter().any(|existing| existing.id == trail.id) {
            return Err(StoreError::DuplicateTrail { id: trail.id });
        }
        info!("registering trail {} ({})", trail.id, trail.relation);
        self.trails.push(TrailRecord::register(trail));
        Ok(())
    }

    /// Persist the index, sorted by trail id.
    pub fn save_index(&mut self) -> Result<(), StoreError> {
        self.trails.sort_by(|a, b| a.id.cmp(&b.id));
        write_json(&self.layout.index_path(), &self.trails, JsonStyle::Pretty)
    }

    /// Replace the stored snapshot of a trail.
    pub fn write_snapshot(&self, id: &TrailId, snapshot: &Snapshot) -> Result<(), StoreError> {
        write_json(&self.layout.trail_snapshot(id), snapshot, JsonStyle::Compact)
    }

    /// Stream the stored snapshot of a trail.
    pub fn stream_snapshot<F>(&self, id: &TrailId, on_element: F) -> Result<ArtifactHeader, StoreError>
    where
        F: FnMut(Element),
    {
        stream_elements(&self.layout.trail_snapshot(id), on_element)
    }

    /// Prefixed ids of every element in a trail's stored snapshot.
    pub fn element_ids(&self, id: &TrailId) -> Result<Vec<ElementId>, StoreError> {
        let mut ids = Vec::new();
        self.stream_snapshot(id, |element| ids.push(element.element_id()))?;
        Ok(ids)
    }

    /// Rebuild the route of `trail` from its stored snapshot.
    pub fn load_route(&self, trail: &TrailRecord) -> Result<StoredRoute, StoreError> {
        let mut builder = RouteBuilder::new();
        let header = self.stream_snapshot(&trail.id, |element| builder.push(element))?;
        Ok(StoredRoute {
            analysis: builder.finish(trail.relation),
            capture_timestamp: header.capture_timestamp,
        })
    }
}
