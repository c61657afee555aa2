//! Behavioural tests for the POI tile refresh and per-trail POI build.

mod support;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::Value;
use std::{cell::RefCell, fs, path::PathBuf};
use support::{chained, day, gapped, register, temp_database};
use tempfile::TempDir;
use traildb_core::{
    ElementId, NoElevation, POI_ZOOM, PoiSchema, Spherical, Tile, TrailId,
    test_support::node,
};
use traildb_data::{
    Overpass, OverpassError, PoiBuildReport, PoiJobError, PoiJobOptions, PoiJobs,
    PoiUpdateReport, Throttle, TrailDatabase, TrailSync, build_trail_collections,
    test_support::{StubOverpass, block_on_for_tests},
};

type RefreshCell = RefCell<Option<Result<PoiUpdateReport, PoiJobError>>>;

struct World {
    _dir: TempDir,
    db: TrailDatabase,
    overpass: Overpass<StubOverpass>,
    schema: PoiSchema,
}

impl World {
    fn jobs(&self) -> PoiJobs<'_> {
        PoiJobs::new(
            self.db.layout(),
            &self.schema,
            &Spherical,
            PoiJobOptions::default(),
        )
    }

    fn written(&self, id: &str) -> Value {
        let path = self.db.layout().trail_pois(&TrailId::from(id));
        let raw = fs::read_to_string(&path)
            .unwrap_or_else(|err| panic!("failed to read {path}: {err}"));
        serde_json::from_str(&raw).unwrap_or_else(|err| panic!("invalid JSON in {path}: {err}"))
    }
}

#[fixture]
fn world() -> RefCell<Option<World>> {
    RefCell::new(None)
}

#[fixture]
fn refresh() -> RefreshCell {
    RefCell::new(None)
}

#[fixture]
fn build() -> RefCell<Option<PoiBuildReport>> {
    RefCell::new(None)
}

#[given("a routable trail and an unroutable trail built on 2024-01-01")]
fn two_trails(#[from(world)] world: &RefCell<Option<World>>) {
    let (dir, mut db) = temp_database();
    register(&mut db, "gr5", 9);
    register(&mut db, "gr10", 10);
    let stub = StubOverpass::new(day("2024-01-01"));
    stub.set_relation(ElementId::relation(9), chained(9, &[100, 101]));
    stub.set_relation(ElementId::relation(10), gapped(10, 200, 201));
    let overpass = Overpass::new(stub, Throttle::immediate().with_max_retries(2));
    let sync = TrailSync::new(&overpass, &NoElevation);
    block_on_for_tests(sync.import_new(&mut db)).expect("import trails");
    build_trail_collections(&db, &Spherical).expect("build collections");
    overpass.source().set_base(day("2024-02-02"));

    let schema = serde_json::from_value(serde_json::json!([
        {"name": "spring", "selector": "node[natural=spring]", "maxDistance": 500},
        {"name": "hut", "selector": "nwr[tourism=alpine_hut]", "maxDistance": 3000}
    ]))
    .expect("valid schema");
    *world.borrow_mut() = Some(World {
        _dir: dir,
        db,
        overpass,
        schema,
    });
}

#[given("a spring beside the routable trail")]
fn spring(#[from(world)] world: &RefCell<Option<World>>) {
    let borrowed = world.borrow();
    let world = borrowed.as_ref().expect("world prepared");
    let location = (7.005, 46.001);
    let tile = Tile::containing(
        geo::Coord {
            x: location.0,
            y: location.1,
        },
        POI_ZOOM,
    );
    world
        .overpass
        .source()
        .set_tile(tile, vec![node(1, location, &[("natural", "spring")])]);
}

#[given("the service keeps reporting data from 2024-01-20")]
fn stale_service(#[from(world)] world: &RefCell<Option<World>>) {
    let borrowed = world.borrow();
    let world = borrowed.as_ref().expect("world prepared");
    world.overpass.source().set_base(day("2024-01-20"));
}

#[when("I refresh the POI tiles for 2024-02-01")]
fn refresh_tiles(#[from(world)] world: &RefCell<Option<World>>, #[from(refresh)] refresh: &RefreshCell) {
    let borrowed = world.borrow();
    let world = borrowed.as_ref().expect("world prepared");
    let jobs = world.jobs();
    let result = jobs.load_trails().map_err(PoiJobError::from).and_then(|trails| {
        block_on_for_tests(jobs.update_poi_tiles(&world.overpass, &trails, day("2024-02-01")))
    });
    *refresh.borrow_mut() = Some(result);
}

#[when("I build the trail POIs")]
fn build_pois(
    #[from(world)] world: &RefCell<Option<World>>,
    #[from(build)] build: &RefCell<Option<PoiBuildReport>>,
) {
    let borrowed = world.borrow();
    let world = borrowed.as_ref().expect("world prepared");
    let jobs = world.jobs();
    let trails = jobs.load_trails().expect("load trails");
    *build.borrow_mut() = Some(jobs.build_trail_pois(&trails).expect("build POIs"));
}

#[then("the routable trail lists the spring")]
fn lists_spring(
    #[from(world)] world: &RefCell<Option<World>>,
    #[from(build)] build: &RefCell<Option<PoiBuildReport>>,
) {
    let borrowed = world.borrow();
    let world = borrowed.as_ref().expect("world prepared");
    let written = world.written("gr5");
    let features = written["features"].as_array().expect("feature array");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["@poi"], "spring");

    let build = build.borrow();
    let report = build.as_ref().expect("POIs built");
    assert_eq!(report.capture_timestamp, Some(day("2024-02-01")));
    assert_eq!(report.total(), 1);
}

#[then("the unroutable trail has an empty collection")]
fn empty_collection(
    #[from(world)] world: &RefCell<Option<World>>,
    #[from(build)] build: &RefCell<Option<PoiBuildReport>>,
) {
    let borrowed = world.borrow();
    let world = borrowed.as_ref().expect("world prepared");
    let written = world.written("gr10");
    assert_eq!(written["type"], "FeatureCollection");
    assert_eq!(written["features"], serde_json::json!([]));

    let build = build.borrow();
    let report = build.as_ref().expect("POIs built");
    let gr10 = report
        .trails
        .iter()
        .find(|trail| trail.id.as_ref() == "gr10")
        .expect("gr10 summary");
    assert_eq!(
        gr10.counts.per_type,
        [("spring".to_owned(), 0), ("hut".to_owned(), 0)]
    );
}

#[then("the refresh fails with stale data")]
fn refresh_stale(#[from(refresh)] refresh: &RefreshCell) {
    let refresh = refresh.borrow();
    let result = refresh.as_ref().expect("refresh attempted");
    assert!(
        matches!(
            result,
            Err(PoiJobError::Overpass(OverpassError::StaleData { attempts: 3, .. }))
        ),
        "unexpected refresh result: {result:?}"
    );
}

#[scenario(path = "tests/features/poi_build.feature", index = 0)]
fn scenario_unroutable_trail_is_empty(
    world: RefCell<Option<World>>,
    refresh: RefreshCell,
    build: RefCell<Option<PoiBuildReport>>,
) {
    let _ = (world, refresh, build);
}

#[scenario(path = "tests/features/poi_build.feature", index = 1)]
fn scenario_stale_tiles_abort(
    world: RefCell<Option<World>>,
    refresh: RefreshCell,
    build: RefCell<Option<PoiBuildReport>>,
) {
    let _ = (world, refresh, build);
}

#[test]
fn scenario_indices_follow_feature_order() {
    let feature =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/features/poi_build.feature");
    let contents = fs::read_to_string(&feature).unwrap_or_else(|err| {
        panic!("failed to read feature file {feature:?}: {err}");
    });
    let titles: Vec<&str> = contents
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Scenario: "))
        .collect();
    assert_eq!(
        titles,
        [
            "an unroutable trail gets an empty POI collection",
            "POI tiles older than the cutoff abort the refresh",
        ]
    );
}
