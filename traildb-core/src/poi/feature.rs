//! GeoJSON output of matched POIs.

use std::collections::BTreeMap;

use geo::Coord;
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::element::{Element, ElementId, ElementMeta};

/// Tags written as JSON numbers when they parse as one.
pub const NUMERIC_TAGS: [&str; 3] = ["ele", "population", "capacity"];

/// Tag value in a POI feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TagValue {
    /// Verbatim value.
    Text(String),
    /// Value of an allow-listed numeric tag.
    Number(f64),
}

impl TagValue {
    /// Coerce `value` to a number if `key` is allow-listed and the value
    /// parses; anything else stays text.
    #[must_use]
    pub fn coerce(key: &str, value: &str) -> Self {
        if NUMERIC_TAGS.contains(&key)
            && let Ok(number) = value.trim().parse::<f64>()
            && number.is_finite()
        {
            return Self::Number(number);
        }
        Self::Text(value.to_owned())
    }
}

/// A POI accepted for a trail.
#[derive(Debug, Clone, PartialEq)]
pub struct PoiFeature {
    /// Source element.
    pub id: ElementId,
    /// Representative point of the element.
    pub location: Coord,
    /// Matched POI type name.
    pub poi_type: String,
    /// Distance to the trail line in metres, rounded to 0.1.
    pub distance_m: f64,
    /// Edit metadata of the source element.
    pub meta: ElementMeta,
    /// Source tags after numeric coercion.
    pub tags: BTreeMap<String, TagValue>,
}

impl PoiFeature {
    /// Build a feature from a matched element.
    #[must_use]
    pub fn new(element: &Element, location: Coord, poi_type: &str, distance_m: f64) -> Self {
        Self {
            id: element.element_id(),
            location,
            poi_type: poi_type.to_owned(),
            distance_m: round_tenth(distance_m),
            meta: element.meta.clone(),
            tags: element
                .tags
                .iter()
                .map(|(key, value)| (key.clone(), TagValue::coerce(key, value)))
                .collect(),
        }
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl Serialize for PoiFeature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut feature = serializer.serialize_map(Some(3))?;
        feature.serialize_entry("type", "Feature")?;
        feature.serialize_entry("properties", &Properties(self))?;
        feature.serialize_entry(
            "geometry",
            &PointGeometry {
                kind: "Point",
                coordinates: [self.location.x, self.location.y],
            },
        )?;
        feature.end()
    }
}

struct Properties<'a>(&'a PoiFeature);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let feature = self.0;
        let meta = &feature.meta;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("@poi", &feature.poi_type)?;
        map.serialize_entry("@distance", &feature.distance_m)?;
        map.serialize_entry("@id", &feature.id)?;
        if let Some(changeset) = meta.changeset {
            map.serialize_entry("@changeset", &changeset)?;
        }
        if let Some(timestamp) = &meta.timestamp {
            map.serialize_entry("@timestamp", timestamp)?;
        }
        if let Some(version) = meta.version {
            map.serialize_entry("@version", &version)?;
        }
        if let Some(uid) = meta.uid {
            map.serialize_entry("@uid", &uid)?;
        }
        if let Some(user) = &meta.user {
            map.serialize_entry("@user", user)?;
        }
        for (key, value) in &feature.tags {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum CollectionKind {
    #[default]
    FeatureCollection,
}

/// GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection<T> {
    #[serde(rename = "type")]
    kind: CollectionKind,
    /// Features in output order.
    pub features: Vec<T>,
}

impl<T> FeatureCollection<T> {
    /// Wrap features in a collection.
    #[must_use]
    pub const fn new(features: Vec<T>) -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features,
        }
    }

    /// Collection without features.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("ele", "2450", TagValue::Number(2_450.0))]
    #[case("capacity", " 24 ", TagValue::Number(24.0))]
    #[case("population", "many", TagValue::Text("many".into()))]
    #[case("name", "1234", TagValue::Text("1234".into()))]
    fn coerces_allow_listed_tags(#[case] key: &str, #[case] value: &str, #[case] expected: TagValue) {
        assert_eq!(TagValue::coerce(key, value), expected);
    }

    #[rstest]
    fn serialises_geojson_point_with_annotations() {
        let element: Element = serde_json::from_value(json!({
            "type": "way", "id": 5, "center": {"lat": 46.5, "lon": 7.9},
            "version": 2, "user": "hiker",
            "tags": {"tourism": "alpine_hut", "ele": "2650"}
        }))
        .expect("valid element");
        let feature = PoiFeature::new(&element, Coord { x: 7.9, y: 46.5 }, "hut", 1_234.567);
        let value = serde_json::to_value(&feature).expect("serialise feature");
        assert_eq!(
            value,
            json!({
                "type": "Feature",
                "properties": {
                    "@poi": "hut", "@distance": 1234.6, "@id": "w5",
                    "@version": 2, "@user": "hiker",
                    "ele": 2650.0, "tourism": "alpine_hut"
                },
                "geometry": {"type": "Point", "coordinates": [7.9, 46.5]}
            })
        );
    }

    #[rstest]
    fn empty_collection_shape() {
        let collection: FeatureCollection<PoiFeature> = FeatureCollection::empty();
        assert_eq!(
            serde_json::to_value(&collection).expect("serialise collection"),
            json!({"type": "FeatureCollection", "features": []})
        );
    }
}
