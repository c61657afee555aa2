//! POI schema: ordered list of POI types with selectors and distance limits.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::element::Element;

/// Tag condition parsed from one `[...]` clause of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPredicate {
    /// Tag key the clause names.
    pub key: String,
    /// Condition on the tag value.
    pub test: TagTest,
}

/// Condition on a tag value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagTest {
    /// `[key]`: the tag only has to exist.
    Present,
    /// `[key=literal]`: the element's value must occur within `literal`.
    ///
    /// The literal may list several values (`"hut|shelter"`), so a value
    /// matches when it is a substring of the literal, not the other way
    /// round.
    ValueIn(String),
}

impl TagPredicate {
    /// Whether `element` satisfies this clause.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        match (&self.test, element.tag(&self.key)) {
            (_, None) => false,
            (TagTest::Present, Some(_)) => true,
            (TagTest::ValueIn(literal), Some(value)) => literal.contains(value),
        }
    }
}

/// Acceptance distance for a POI type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DistanceThreshold {
    /// One limit for every element of the type, in metres.
    Scalar(f64),
    /// Limits keyed by the value of the type's first selector tag.
    PerValue(BTreeMap<String, f64>),
}

/// Errors raised while parsing a selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// No `[...]` clause was found.
    #[error("selector {selector:?} has no tag clause")]
    MissingClause { selector: String },
    /// A `[` was not closed.
    #[error("selector {selector:?} has an unterminated tag clause")]
    Unterminated { selector: String },
    /// A clause has an empty key.
    #[error("selector {selector:?} has a clause without a key")]
    EmptyKey { selector: String },
}

/// One entry of the POI schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoiType {
    /// Name written to matched features.
    pub name: String,
    /// Overpass selector, e.g. `node[amenity=drinking_water]`.
    pub selector: String,
    /// Acceptance distance.
    #[serde(rename = "maxDistance")]
    pub threshold: DistanceThreshold,
    #[serde(skip)]
    predicates: Vec<TagPredicate>,
}

impl PoiType {
    /// Build a type, parsing its selector.
    pub fn new(
        name: impl Into<String>,
        selector: impl Into<String>,
        threshold: DistanceThreshold,
    ) -> Result<Self, SchemaError> {
        let selector = selector.into();
        let predicates = parse_selector(&selector)?;
        Ok(Self {
            name: name.into(),
            selector,
            threshold,
            predicates,
        })
    }

    /// Parsed tag clauses, in selector order.
    #[must_use]
    pub fn predicates(&self) -> &[TagPredicate] {
        &self.predicates
    }

    /// Whether every clause of the selector accepts `element`, as Overpass
    /// evaluates `node[a][b]`.
    #[must_use]
    pub fn matches(&self, element: &Element) -> bool {
        self.predicates.iter().all(|predicate| predicate.matches(element))
    }

    /// Acceptance distance for `element`.
    ///
    /// Per-value thresholds are keyed by the element's value of the first
    /// selector tag; a value without an entry yields `None`.
    #[must_use]
    pub fn threshold_for(&self, element: &Element) -> Option<f64> {
        match &self.threshold {
            DistanceThreshold::Scalar(limit) => Some(*limit),
            DistanceThreshold::PerValue(limits) => {
                let key = &self.predicates.first()?.key;
                limits.get(element.tag(key)?).copied()
            }
        }
    }
}

#[derive(Deserialize)]
struct RawPoiType {
    name: String,
    selector: String,
    #[serde(rename = "maxDistance")]
    threshold: DistanceThreshold,
}

impl<'de> Deserialize<'de> for PoiType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawPoiType::deserialize(deserializer)?;
        Self::new(raw.name, raw.selector, raw.threshold).map_err(serde::de::Error::custom)
    }
}

fn parse_selector(selector: &str) -> Result<Vec<TagPredicate>, SchemaError> {
    let mut predicates = Vec::new();
    let mut rest = selector;
    while let Some(open) = rest.find('[') {
        let after = rest.get(open + 1..).unwrap_or_default();
        let close = after.find(']').ok_or_else(|| SchemaError::Unterminated {
            selector: selector.to_owned(),
        })?;
        let clause = after.get(..close).unwrap_or_default();
        predicates.push(parse_clause(clause, selector)?);
        rest = after.get(close + 1..).unwrap_or_default();
    }
    if predicates.is_empty() {
        return Err(SchemaError::MissingClause {
            selector: selector.to_owned(),
        });
    }
    Ok(predicates)
}

fn parse_clause(clause: &str, selector: &str) -> Result<TagPredicate, SchemaError> {
    let unquote = |text: &str| text.trim().trim_matches('"').to_owned();
    let (key, test) = match clause.split_once('=') {
        Some((key, value)) => (unquote(key), TagTest::ValueIn(unquote(value))),
        None => (unquote(clause), TagTest::Present),
    };
    if key.is_empty() {
        return Err(SchemaError::EmptyKey {
            selector: selector.to_owned(),
        });
    }
    Ok(TagPredicate { key, test })
}

/// Ordered POI schema; earlier types take priority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoiSchema {
    types: Vec<PoiType>,
}

impl PoiSchema {
    /// Build a schema from types in priority order.
    #[must_use]
    pub const fn new(types: Vec<PoiType>) -> Self {
        Self { types }
    }

    /// Types in priority order.
    #[must_use]
    pub fn types(&self) -> &[PoiType] {
        &self.types
    }

    /// Whether the schema has no types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// First type whose selector accepts `element`.
    ///
    /// # Examples
    /// ```
    /// use traildb_core::poi::{DistanceThreshold, PoiSchema, PoiType};
    ///
    /// let schema = PoiSchema::new(vec![
    ///     PoiType::new("water", "node[amenity=drinking_water]", DistanceThreshold::Scalar(500.0))
    ///         .expect("valid selector"),
    /// ]);
    /// let element = serde_json::from_str(
    ///     r#"{"type": "node", "id": 1, "lat": 0, "lon": 0, "tags": {"amenity": "drinking_water"}}"#,
    /// ).expect("valid element");
    /// assert_eq!(schema.classify(&element).map(|poi| poi.name.as_str()), Some("water"));
    /// ```
    #[must_use]
    pub fn classify(&self, element: &Element) -> Option<&PoiType> {
        self.types.iter().find(|poi| poi.matches(element))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::node;
    use rstest::rstest;

    #[rstest]
    #[case("node[amenity=drinking_water]", vec![("amenity", Some("drinking_water"))])]
    #[case("nwr[tourism]", vec![("tourism", None)])]
    #[case(r#"node["natural"="spring"][drinking_water]"#, vec![("natural", Some("spring")), ("drinking_water", None)])]
    fn parses_selectors(#[case] selector: &str, #[case] expected: Vec<(&str, Option<&str>)>) {
        let parsed = parse_selector(selector).expect("valid selector");
        let simplified: Vec<(&str, Option<&str>)> = parsed
            .iter()
            .map(|predicate| {
                let value = match &predicate.test {
                    TagTest::Present => None,
                    TagTest::ValueIn(literal) => Some(literal.as_str()),
                };
                (predicate.key.as_str(), value)
            })
            .collect();
        assert_eq!(simplified, expected);
    }

    #[rstest]
    #[case("node", SchemaError::MissingClause { selector: "node".into() })]
    #[case("node[amenity", SchemaError::Unterminated { selector: "node[amenity".into() })]
    #[case("node[=x]", SchemaError::EmptyKey { selector: "node[=x]".into() })]
    fn rejects_bad_selectors(#[case] selector: &str, #[case] expected: SchemaError) {
        assert_eq!(parse_selector(selector), Err(expected));
    }

    #[rstest]
    fn value_must_occur_within_literal() {
        let poi = PoiType::new(
            "hut",
            "nwr[tourism=alpine_hut|wilderness_hut]",
            DistanceThreshold::Scalar(1_000.0),
        )
        .expect("valid selector");
        assert!(poi.matches(&node(1, (0.0, 0.0), &[("tourism", "wilderness_hut")])));
        assert!(!poi.matches(&node(2, (0.0, 0.0), &[("tourism", "hotel")])));
        assert!(!poi.matches(&node(3, (0.0, 0.0), &[("amenity", "alpine_hut")])));
    }

    #[rstest]
    #[case(&[("natural", "spring"), ("drinking_water", "yes")], true)]
    #[case(&[("natural", "spring")], false)]
    #[case(&[("drinking_water", "yes")], false)]
    fn every_clause_must_match(#[case] tags: &[(&str, &str)], #[case] expected: bool) {
        let poi = PoiType::new(
            "drinkable spring",
            r#"node["natural"="spring"][drinking_water]"#,
            DistanceThreshold::Scalar(1_000.0),
        )
        .expect("valid selector");
        assert_eq!(poi.matches(&node(1, (0.0, 0.0), tags)), expected);
    }

    #[rstest]
    fn earlier_schema_entries_win() {
        let schema = PoiSchema::new(vec![
            PoiType::new("spring", "node[natural=spring]", DistanceThreshold::Scalar(100.0))
                .expect("valid selector"),
            PoiType::new("water", "node[drinking_water]", DistanceThreshold::Scalar(500.0))
                .expect("valid selector"),
        ]);
        let element = node(
            1,
            (0.0, 0.0),
            &[("natural", "spring"), ("drinking_water", "yes")],
        );
        assert_eq!(
            schema.classify(&element).map(|poi| poi.name.as_str()),
            Some("spring")
        );
        let plain = node(2, (0.0, 0.0), &[("drinking_water", "yes")]);
        assert_eq!(
            schema.classify(&plain).map(|poi| poi.name.as_str()),
            Some("water")
        );
        assert!(schema.classify(&node(3, (0.0, 0.0), &[("shop", "bakery")])).is_none());
    }

    #[rstest]
    fn resolves_per_value_thresholds() {
        let schema: PoiSchema = serde_json::from_str(
            r#"[{"name": "place", "selector": "node[place=city|town|village]",
                 "maxDistance": {"city": 5000, "town": 3000}}]"#,
        )
        .expect("valid schema");
        let place = schema.types().first().expect("one type");
        let town = node(1, (0.0, 0.0), &[("place", "town")]);
        let village = node(2, (0.0, 0.0), &[("place", "village")]);
        assert_eq!(place.threshold_for(&town), Some(3_000.0));
        assert_eq!(place.threshold_for(&village), None);
    }

    #[rstest]
    fn schema_json_rejects_bad_selector() {
        let result: Result<PoiSchema, _> =
            serde_json::from_str(r#"[{"name": "x", "selector": "node", "maxDistance": 1}]"#);
        assert!(result.is_err());
    }
}
