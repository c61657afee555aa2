//! Geometry primitives used by the corridor indexer, POI matcher and the
//! trail collection build.
//!
//! Coordinates are WGS84 with `x` = longitude and `y` = latitude. Distances
//! are metres on a sphere.

use geo::{
    Bearing, Closest, Coord, Destination, Distance, Haversine, HaversineClosestPoint, LineString,
    Point, Polygon, Simplify,
};

/// Geometry capability consumed by the indexer and matcher.
pub trait GeometryOps: Send + Sync {
    /// Polygon covering every point within `radius_m` of `line`.
    ///
    /// `steps` is the number of segments used per quarter circle on rounded
    /// joins and caps. An empty line yields an empty polygon.
    fn buffer(&self, line: &LineString, radius_m: f64, steps: u32) -> Polygon;

    /// Shortest distance in metres from `point` to any segment of `line`.
    /// Returns `f64::INFINITY` for an empty line.
    fn point_to_line_distance(&self, point: Coord, line: &LineString) -> f64;

    /// Reduce the vertex count of `line`; `tolerance` is in degrees.
    fn simplify(&self, line: &LineString, tolerance: f64) -> LineString;
}

/// [`GeometryOps`] on the haversine sphere.
#[derive(Debug, Default, Clone, Copy)]
pub struct Spherical;

impl GeometryOps for Spherical {
    fn buffer(&self, line: &LineString, radius_m: f64, steps: u32) -> Polygon {
        let points = dedup_consecutive(line);
        let step_deg = 90.0 / f64::from(steps.max(1));
        let ring: Vec<Coord> = match points.as_slice() {
            [] => Vec::new(),
            [single] => arc(*single, 0.0, 360.0, step_deg, radius_m),
            _ => {
                let reversed: Vec<Coord> = points.iter().rev().copied().collect();
                let mut ring = left_side(&points, radius_m, step_deg);
                ring.extend(end_cap(&points, radius_m, step_deg));
                ring.extend(left_side(&reversed, radius_m, step_deg));
                ring.extend(end_cap(&reversed, radius_m, step_deg));
                ring
            }
        };
        Polygon::new(LineString::from(ring), Vec::new())
    }

    fn point_to_line_distance(&self, point: Coord, line: &LineString) -> f64 {
        let from = Point::from(point);
        if let [only] = line.0.as_slice() {
            return Haversine.distance(from, Point::from(*only));
        }
        match line.haversine_closest_point(&from) {
            Closest::Intersection(_) => 0.0,
            Closest::SinglePoint(closest) => Haversine.distance(from, closest),
            Closest::Indeterminate => f64::INFINITY,
        }
    }

    fn simplify(&self, line: &LineString, tolerance: f64) -> LineString {
        line.simplify(tolerance)
    }
}

fn bearing(from: Coord, to: Coord) -> f64 {
    Haversine.bearing(Point::from(from), Point::from(to))
}

fn destination(origin: Coord, bearing_deg: f64, distance_m: f64) -> Coord {
    Haversine
        .destination(Point::from(origin), bearing_deg, distance_m)
        .into()
}

fn dedup_consecutive(line: &LineString) -> Vec<Coord> {
    let mut points: Vec<Coord> = Vec::with_capacity(line.0.len());
    for coord in &line.0 {
        if points.last() != Some(coord) {
            points.push(*coord);
        }
    }
    points
}

/// Points on a circle around `center` from `from_deg` sweeping `sweep_deg`
/// clockwise, both ends included.
fn arc(center: Coord, from_deg: f64, sweep_deg: f64, step_deg: f64, radius_m: f64) -> Vec<Coord> {
    if sweep_deg.abs() < 1e-9 {
        return vec![destination(center, from_deg, radius_m)];
    }
    let segments = (sweep_deg.abs() / step_deg).ceil().max(1.0) as u32;
    let increment = sweep_deg / f64::from(segments);
    (0..=segments)
        .map(|index| destination(center, from_deg + increment * f64::from(index), radius_m))
        .collect()
}

fn signed_turn(from_deg: f64, to_deg: f64) -> f64 {
    let delta = (to_deg - from_deg).rem_euclid(360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Offset points on the left of travel along `points`, with rounded joins.
fn left_side(points: &[Coord], radius_m: f64, step_deg: f64) -> Vec<Coord> {
    let mut side = Vec::new();
    for (index, vertex) in points.iter().enumerate() {
        let incoming = index
            .checked_sub(1)
            .and_then(|prev| points.get(prev))
            .map(|prev| bearing(*vertex, *prev) + 180.0);
        let outgoing = points.get(index + 1).map(|next| bearing(*vertex, *next));
        match (incoming, outgoing) {
            (Some(inc), Some(out)) => {
                let turn = signed_turn(inc, out);
                side.extend(arc(*vertex, inc - 90.0, turn, step_deg, radius_m));
            }
            (Some(dir), None) | (None, Some(dir)) => {
                side.push(destination(*vertex, dir - 90.0, radius_m));
            }
            (None, None) => {}
        }
    }
    side
}

/// Rounded cap around the last vertex, excluding the two side points.
fn end_cap(points: &[Coord], radius_m: f64, step_deg: f64) -> Vec<Coord> {
    let (Some(last), Some(prev)) = (points.last(), points.iter().rev().nth(1)) else {
        return Vec::new();
    };
    let heading = bearing(*last, *prev) + 180.0;
    let mut cap = arc(*last, heading - 90.0, 180.0, step_deg, radius_m);
    cap.pop();
    if !cap.is_empty() {
        cap.remove(0);
    }
    cap
}
