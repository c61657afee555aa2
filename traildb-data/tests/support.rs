//! Builders shared by the behaviour tests.

use camino::Utf8PathBuf;
use tempfile::TempDir;
use traildb_core::{
    Element, ElementId, NewTrail, Timestamp, TrailId,
    test_support::{relation, way},
};
use traildb_data::{DataLayout, TrailDatabase};

/// Parse a test timestamp.
pub fn day(raw: &str) -> Timestamp {
    raw.parse()
        .unwrap_or_else(|err| panic!("invalid test timestamp {raw:?}: {err}"))
}

/// Empty database below a fresh temporary directory.
pub fn temp_database() -> (TempDir, TrailDatabase) {
    let dir = TempDir::new().unwrap_or_else(|err| panic!("failed to create temp dir: {err}"));
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
        .unwrap_or_else(|path| panic!("temp dir {path:?} is not UTF-8"));
    let layout = DataLayout::new(root.join("data"), root.join("dist"));
    let db = TrailDatabase::create_or_open(layout)
        .unwrap_or_else(|err| panic!("failed to create database: {err}"));
    (dir, db)
}

/// Register trail `id` tracking relation `relation`.
pub fn register(db: &mut TrailDatabase, id: &str, relation: u64) {
    db.register(NewTrail {
        id: TrailId::from(id),
        name: id.to_uppercase(),
        color: None,
        relation: ElementId::relation(relation),
        wikidata: None,
    })
    .unwrap_or_else(|err| panic!("failed to register {id}: {err}"));
}

fn lon(step: u32) -> f64 {
    f64::from(700 + step) / 100.0
}

/// Relation `id` whose tagged ways chain west to east along 46°N.
pub fn chained(id: u64, ways: &[u64]) -> Vec<Element> {
    let members: Vec<(&str, u64, &str)> = ways.iter().map(|&way_id| ("w", way_id, "")).collect();
    let mut elements = vec![relation(id, &members)];
    for (step, &way_id) in (0_u32..).zip(ways) {
        elements.push(way(
            way_id,
            &[(lon(step), 46.0), (lon(step + 1), 46.0)],
            &[("sac_scale", "hiking"), ("surface", "dirt")],
        ));
    }
    elements
}

/// Relation `id` whose second way does not touch the first.
pub fn gapped(id: u64, first: u64, second: u64) -> Vec<Element> {
    vec![
        relation(id, &[("w", first, ""), ("w", second, "")]),
        way(first, &[(lon(0), 46.0), (lon(1), 46.0)], &[]),
        way(second, &[(lon(2), 46.5), (lon(3), 46.5)], &[]),
    ]
}
