//! Element builders and geometry doubles shared by unit and behaviour tests.

use geo::{Coord, LineString, Polygon};

use crate::{
    element::{Element, ElementId, ElementKind, LatLon, Member, Tags},
    geometry::{GeometryOps, Spherical},
};

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn bare(kind: ElementKind, id: u64) -> Element {
    Element::new(ElementId::new(kind, id))
}

/// Node at `(lon, lat)`.
#[must_use]
pub fn node(id: u64, (lon, lat): (f64, f64), pairs: &[(&str, &str)]) -> Element {
    Element {
        lat: Some(lat),
        lon: Some(lon),
        tags: tags(pairs),
        ..bare(ElementKind::Node, id)
    }
}

/// Way with inline geometry; `points` are `(lon, lat)` pairs.
#[must_use]
pub fn way(id: u64, points: &[(f64, f64)], pairs: &[(&str, &str)]) -> Element {
    let geometry = points
        .iter()
        .map(|&(lon, lat)| LatLon { lat, lon })
        .collect();
    Element {
        geometry: Some(geometry),
        tags: tags(pairs),
        ..bare(ElementKind::Way, id)
    }
}

/// Way carrying only a service-computed centre, as POI tiles deliver them.
#[must_use]
pub fn area(id: u64, (lon, lat): (f64, f64), pairs: &[(&str, &str)]) -> Element {
    Element {
        center: Some(LatLon { lat, lon }),
        tags: tags(pairs),
        ..bare(ElementKind::Way, id)
    }
}

/// Relation whose members are `(prefix, ref, role)` with prefix `n`, `w` or
/// `r`.
///
/// # Panics
/// Panics on an unknown prefix.
#[must_use]
pub fn relation(id: u64, members: &[(&str, u64, &str)]) -> Element {
    let members = members
        .iter()
        .map(|&(prefix, reference, role)| Member {
            kind: match prefix {
                "n" => ElementKind::Node,
                "w" => ElementKind::Way,
                "r" => ElementKind::Relation,
                other => panic!("unknown member prefix {other:?}"),
            },
            reference,
            role: role.to_owned(),
        })
        .collect();
    Element {
        members,
        ..bare(ElementKind::Relation, id)
    }
}

/// Geometry double reporting the same distance for every point.
///
/// Buffering and simplification defer to [`Spherical`].
#[derive(Debug, Clone, Copy)]
pub struct FixedDistance(pub f64);

impl GeometryOps for FixedDistance {
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
