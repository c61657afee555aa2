//! Raw map elements as delivered by the Overpass API and their identifiers.
//!
//! Node, way and relation ids share a numeric space in OpenStreetMap, so every
//! id used for change tracking carries its one-letter type prefix (`n`, `w`,
//! `r`). The prefixed form is what the diff query reports and what the reverse
//! index is keyed by.

use std::{collections::BTreeMap, fmt, str::FromStr};

use geo::{Coord, LineString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Free-form OpenStreetMap tags.
pub type Tags = BTreeMap<String, String>;

/// OpenStreetMap element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A point.
    Node,
    /// An ordered list of nodes.
    Way,
    /// A collection of members with roles.
    Relation,
}

impl ElementKind {
    /// One-letter prefix used by prefixed ids.
    #[must_use]
    pub const fn prefix(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }

    /// Overpass QL keyword selecting elements of this type.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    const fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'n' => Some(Self::Node),
            'w' => Some(Self::Way),
            'r' => Some(Self::Relation),
            _ => None,
        }
    }
}

/// Globally unique element id: type prefix plus numeric id.
///
/// # Examples
/// ```
/// use traildb_core::{ElementId, ElementKind};
///
/// let id: ElementId = "w100".parse().expect("valid id");
/// assert_eq!(id, ElementId::new(ElementKind::Way, 100));
/// assert_eq!(id.to_string(), "w100");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId {
    kind: ElementKind,
    id: u64,
}

impl ElementId {
    /// Build an id from its parts.
    #[must_use]
    pub const fn new(kind: ElementKind, id: u64) -> Self {
        Self { kind, id }
    }

    /// Shorthand for a relation id.
    #[must_use]
    pub const fn relation(id: u64) -> Self {
        Self::new(ElementKind::Relation, id)
    }

    /// Element type.
    #[must_use]
    pub const fn kind(self) -> ElementKind {
        self.kind
    }

    /// Numeric id without the prefix.
    #[must_use]
    pub const fn number(self) -> u64 {
        self.id
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.id)
    }
}

/// Errors raised when parsing a prefixed element id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ElementIdError {
    /// The input was empty.
    #[error("element id is empty")]
    Empty,
    /// The first character is not `n`, `w` or `r`.
    #[error("element id {input:?} has an unknown type prefix")]
    UnknownPrefix { input: String },
    /// The remainder is not a non-negative integer.
    #[error("element id {input:?} has a non-numeric body")]
    InvalidNumber { input: String },
}

impl FromStr for ElementId {
    type Err = ElementIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut chars = input.chars();
        let prefix = chars.next().ok_or(ElementIdError::Empty)?;
        let kind = ElementKind::from_prefix(prefix).ok_or_else(|| {
            ElementIdError::UnknownPrefix {
                input: input.to_owned(),
            }
        })?;
        let id = chars
            .as_str()
            .parse::<u64>()
            .map_err(|_| ElementIdError::InvalidNumber {
                input: input.to_owned(),
            })?;
        Ok(Self::new(kind, id))
    }
}

impl Serialize for ElementId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ElementId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// WGS84 position in Overpass' `{ "lat", "lon" }` shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    /// Convert into a `geo` coordinate (`x` = longitude).
    #[must_use]
    pub const fn coord(self) -> Coord {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

impl From<Coord> for LatLon {
    fn from(coord: Coord) -> Self {
        Self {
            lat: coord.y,
            lon: coord.x,
        }
    }
}

/// Relation member reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Member element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Member numeric id.
    #[serde(rename = "ref")]
    pub reference: u64,
    /// Role within the relation; empty when unset.
    #[serde(default)]
    pub role: String,
}

impl Member {
    /// Prefixed id of the referenced element.
    #[must_use]
    pub const fn element_id(&self) -> ElementId {
        ElementId::new(self.kind, self.reference)
    }
}

/// Edit metadata attached by `out meta`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementMeta {
    /// Last edit time as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Element version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Changeset of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changeset: Option<u64>,
    /// Display name of the last editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Numeric id of the last editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
}

/// Map element in Overpass JSON form. Fields the service did not send stay
/// empty; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Numeric id.
    pub id: u64,
    /// Node latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    /// Node longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    /// Centre computed by `out center` for ways and relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<LatLon>,
    /// Way geometry emitted by `out geom`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Vec<LatLon>>,
    /// Way node references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<u64>,
    /// Relation members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
    /// Element tags.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    /// Edit metadata.
    #[serde(flatten)]
    pub meta: ElementMeta,
}

impl Element {
    /// Element with an id and nothing else, as `out ids` reports it.
    #[must_use]
    pub fn new(id: ElementId) -> Self {
        Self {
            kind: id.kind(),
            id: id.number(),
            lat: None,
            lon: None,
            center: None,
            geometry: None,
            nodes: Vec::new(),
            members: Vec::new(),
            tags: Tags::new(),
            meta: ElementMeta::default(),
        }
    }

    /// Prefixed id of this element.
    #[must_use]
    pub const fn element_id(&self) -> ElementId {
        ElementId::new(self.kind, self.id)
    }

    /// Tag value by key.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Point used for distance checks: the node's own position, or the
    /// service-computed centre for ways and relations.
    #[must_use]
    pub fn representative_point(&self) -> Option<Coord> {
        match (self.kind, self.lat, self.lon) {
            (ElementKind::Node, Some(lat), Some(lon)) => Some(Coord { x: lon, y: lat }),
            (ElementKind::Node, _, _) => None,
            _ => self.center.map(LatLon::coord),
        }
    }

    /// Way geometry as a line, if the element carries one.
    #[must_use]
    pub fn line(&self) -> Option<LineString> {
        self.geometry
            .as_ref()
            .map(|points| points.iter().map(|point| point.coord()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("n1", ElementKind::Node, 1)]
    #[case("w100", ElementKind::Way, 100)]
    #[case("r7418431", ElementKind::Relation, 7_418_431)]
    fn parses_prefixed_ids(#[case] input: &str, #[case] kind: ElementKind, #[case] number: u64) {
        let id: ElementId = input.parse().expect("valid id");
        assert_eq!(id.kind(), kind);
        assert_eq!(id.number(), number);
        assert_eq!(id.to_string(), input);
    }

    #[rstest]
    #[case("", ElementIdError::Empty)]
    #[case("x12", ElementIdError::UnknownPrefix { input: "x12".into() })]
    #[case("w", ElementIdError::InvalidNumber { input: "w".into() })]
    #[case("w-3", ElementIdError::InvalidNumber { input: "w-3".into() })]
    fn rejects_malformed_ids(#[case] input: &str, #[case] expected: ElementIdError) {
        assert_eq!(input.parse::<ElementId>(), Err(expected));
    }

    #[rstest]
    fn same_number_differs_across_types() {
        let way: ElementId = "w5".parse().expect("valid id");
        let node: ElementId = "n5".parse().expect("valid id");
        assert_ne!(way, node);
    }

    #[rstest]
    fn decodes_overpass_way_with_center_and_meta() {
        let raw = r#"{
            "type": "way", "id": 42, "center": {"lat": 47.1, "lon": 8.2},
            "nodes": [1, 2], "tags": {"amenity": "shelter"},
            "timestamp": "2024-05-01T10:00:00Z", "version": 3, "changeset": 99,
            "user": "mapper", "uid": 7, "bounds": {"minlat": 0}
        }"#;
        let element: Element = serde_json::from_str(raw).expect("decode way");
        assert_eq!(element.element_id().to_string(), "w42");
        assert_eq!(element.tag("amenity"), Some("shelter"));
        assert_eq!(element.meta.version, Some(3));
        assert_eq!(
            element.representative_point(),
            Some(Coord { x: 8.2, y: 47.1 })
        );
    }

    #[rstest]
    fn nodes_use_their_own_position() {
        let raw = r#"{"type": "node", "id": 1, "lat": 46.5, "lon": 7.5, "center": {"lat": 0, "lon": 0}}"#;
        let element: Element = serde_json::from_str(raw).expect("decode node");
        assert_eq!(
            element.representative_point(),
            Some(Coord { x: 7.5, y: 46.5 })
        );
    }

    #[rstest]
    fn ways_without_center_have_no_representative_point() {
        let raw = r#"{"type": "way", "id": 1, "tags": {"tourism": "alpine_hut"}}"#;
        let element: Element = serde_json::from_str(raw).expect("decode way");
        assert!(element.representative_point().is_none());
    }
}
