//! Behavioural tests for POI classification and the distance boundary.

use geo::{Coord, LineString, Polygon};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::json;
use std::cell::{Cell, RefCell};
use traildb_core::{
    Element, GeometryOps, MatchOutcome, MatcherOptions, PoiMatcher, PoiSchema, Spherical,
};

/// Reports a preset distance so the boundary can be probed exactly.
struct Measured(f64);

impl GeometryOps for Measured {
    fn buffer(&self, line: &LineString, radius_m: f64, steps: u32) -> Polygon {
        Spherical.buffer(line, radius_m, steps)
    }

    fn point_to_line_distance(&self, _point: Coord, _line: &LineString) -> f64 {
        self.0
    }

    fn simplify(&self, line: &LineString, tolerance: f64) -> LineString {
        Spherical.simplify(line, tolerance)
    }
}

fn element(value: serde_json::Value) -> Element {
    serde_json::from_value(value).expect("valid element")
}

fn schema(value: serde_json::Value) -> PoiSchema {
    serde_json::from_value(value).expect("valid schema")
}

#[fixture]
fn poi_schema() -> RefCell<Option<PoiSchema>> {
    RefCell::new(None)
}

#[fixture]
fn candidate() -> RefCell<Option<Element>> {
    RefCell::new(None)
}

#[fixture]
fn distance() -> Cell<f64> {
    Cell::new(0.0)
}

#[fixture]
fn outcome() -> RefCell<Option<MatchOutcome>> {
    RefCell::new(None)
}

#[fixture]
fn classified() -> RefCell<Option<String>> {
    RefCell::new(None)
}

#[given("a spring schema with a 1500 metre threshold")]
fn spring_schema(#[from(poi_schema)] poi_schema: &RefCell<Option<PoiSchema>>) {
    *poi_schema.borrow_mut() = Some(schema(json!([
        {"name": "spring", "selector": "node[natural=spring]", "maxDistance": 1500}
    ])));
}

#[given("a schema listing springs before drinking water")]
fn ordered_schema(#[from(poi_schema)] poi_schema: &RefCell<Option<PoiSchema>>) {
    *poi_schema.borrow_mut() = Some(schema(json!([
        {"name": "spring", "selector": "node[natural=spring]", "maxDistance": 500},
        {"name": "water", "selector": "node[drinking_water=yes]", "maxDistance": 500}
    ])));
}

fn spring_at(
    metres: f64,
    candidate: &RefCell<Option<Element>>,
    distance: &Cell<f64>,
) {
    *candidate.borrow_mut() = Some(element(json!({
        "type": "node", "id": 42, "lat": 46.01, "lon": 7.0,
        "version": 3, "tags": {"natural": "spring", "ele": "1820"}
    })));
    distance.set(metres);
}

#[given("a spring measured 1500.0 metres from the trail")]
fn spring_at_threshold(
    #[from(candidate)] candidate: &RefCell<Option<Element>>,
    #[from(distance)] distance: &Cell<f64>,
) {
    spring_at(1_500.0, candidate, distance);
}

#[given("a spring measured 1500.1 metres from the trail")]
fn spring_beyond_threshold(
    #[from(candidate)] candidate: &RefCell<Option<Element>>,
    #[from(distance)] distance: &Cell<f64>,
) {
    spring_at(1_500.1, candidate, distance);
}

#[given("a spring that also provides drinking water")]
fn drinkable_spring(#[from(candidate)] candidate: &RefCell<Option<Element>>) {
    *candidate.borrow_mut() = Some(element(json!({
        "type": "node", "id": 7, "lat": 46.0, "lon": 7.0,
        "tags": {"natural": "spring", "drinking_water": "yes"}
    })));
}

#[when("I match the spring against the trail")]
fn match_spring(
    #[from(poi_schema)] poi_schema: &RefCell<Option<PoiSchema>>,
    #[from(candidate)] candidate: &RefCell<Option<Element>>,
    #[from(distance)] distance: &Cell<f64>,
    #[from(outcome)] outcome: &RefCell<Option<MatchOutcome>>,
) {
    let schema = poi_schema.borrow();
    let schema = schema.as_ref().expect("schema prepared");
    let line = LineString::from(vec![(7.0, 46.0), (7.0, 46.1)]);
    let geometry = Measured(distance.get());
    let matcher = PoiMatcher::new(schema, &geometry, &line, MatcherOptions::default());
    let spring = candidate.borrow();
    let result = matcher.match_element(spring.as_ref().expect("spring prepared"));
    *outcome.borrow_mut() = Some(result);
}

#[when("I classify the element")]
fn classify_element(
    #[from(poi_schema)] poi_schema: &RefCell<Option<PoiSchema>>,
    #[from(candidate)] candidate: &RefCell<Option<Element>>,
    #[from(classified)] classified: &RefCell<Option<String>>,
) {
    let schema = poi_schema.borrow();
    let element = candidate.borrow();
    let name = schema
        .as_ref()
        .expect("schema prepared")
        .classify(element.as_ref().expect("element prepared"))
        .map(|poi| poi.name.clone());
    *classified.borrow_mut() = name;
}

#[then("the spring is accepted at 1500.0 metres")]
fn accepted(#[from(outcome)] outcome: &RefCell<Option<MatchOutcome>>) {
    match outcome.borrow().as_ref().expect("element matched") {
        MatchOutcome::Accepted(feature) => {
            assert_eq!(feature.poi_type, "spring");
            assert!((feature.distance_m - 1_500.0).abs() < f64::EPSILON);
            assert_eq!(feature.id.to_string(), "n42");
        }
        other => panic!("expected the spring to be accepted, got {other:?}"),
    }
}

#[then("the spring is rejected as too far")]
fn rejected(#[from(outcome)] outcome: &RefCell<Option<MatchOutcome>>) {
    match outcome.borrow().as_ref().expect("element matched") {
        MatchOutcome::TooFar {
            poi_type,
            distance_m,
        } => {
            assert_eq!(poi_type, "spring");
            assert!(*distance_m > 1_500.0);
        }
        other => panic!("expected the spring to be rejected, got {other:?}"),
    }
}

#[then("it is classified as a spring")]
fn classified_as_spring(#[from(classified)] classified: &RefCell<Option<String>>) {
    assert_eq!(classified.borrow().as_deref(), Some("spring"));
}

#[scenario(path = "tests/features/poi_matcher.feature", index = 0)]
fn scenario_at_threshold(
    poi_schema: RefCell<Option<PoiSchema>>,
    candidate: RefCell<Option<Element>>,
    distance: Cell<f64>,
    outcome: RefCell<Option<MatchOutcome>>,
    classified: RefCell<Option<String>>,
) {
    let _ = (poi_schema, candidate, distance, outcome, classified);
}

#[scenario(path = "tests/features/poi_matcher.feature", index = 1)]
fn scenario_beyond_threshold(
    poi_schema: RefCell<Option<PoiSchema>>,
    candidate: RefCell<Option<Element>>,
    distance: Cell<f64>,
    outcome: RefCell<Option<MatchOutcome>>,
    classified: RefCell<Option<String>>,
) {
    let _ = (poi_schema, candidate, distance, outcome, classified);
}

#[scenario(path = "tests/features/poi_matcher.feature", index = 2)]
fn scenario_schema_priority(
    poi_schema: RefCell<Option<PoiSchema>>,
    candidate: RefCell<Option<Element>>,
    distance: Cell<f64>,
    outcome: RefCell<Option<MatchOutcome>>,
    classified: RefCell<Option<String>>,
) {
    let _ = (poi_schema, candidate, distance, outcome, classified);
}
