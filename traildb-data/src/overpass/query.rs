//! Overpass QL text for the three query shapes the database issues.

use std::fmt;

use traildb_core::{ElementId, PoiSchema, Tile, Timestamp};

/// Server-side timeout requested by change queries, in seconds.
pub const CHANGE_QUERY_TIMEOUT_SECS: u32 = 3404;

/// What a query asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Ids of elements modified since each trail was last checked.
    Changes,
    /// Full snapshot of one relation.
    Relation(ElementId),
    /// POI candidates inside one tile.
    PoiTile(Tile),
}

/// An Overpass QL query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverpassQuery {
    kind: QueryKind,
    text: String,
}

impl OverpassQuery {
    /// Ask which elements of each relation changed after the trail's check
    /// date, evaluated as of `cutoff`.
    ///
    /// # Examples
    /// ```
    /// use traildb_core::ElementId;
    /// use traildb_data::overpass::OverpassQuery;
    ///
    /// let checked = "2024-01-01".parse().expect("valid date");
    /// let cutoff = "2024-02-01".parse().expect("valid date");
    /// let query = OverpassQuery::changed_elements([(ElementId::relation(9), checked)], cutoff);
    /// assert_eq!(
    ///     query.as_str(),
    ///     "[out:json][timeout:3404][date:\"2024-02-01T00:00:00Z\"];\n\
    ///      (relation(9); >>;); wr._(newer:\"2024-01-01T00:00:00Z\"); out ids qt;",
    /// );
    /// ```
    #[must_use]
    pub fn changed_elements<I>(trails: I, cutoff: Timestamp) -> Self
    where
        I: IntoIterator<Item = (ElementId, Timestamp)>,
    {
        let header = format!("[out:json][timeout:{CHANGE_QUERY_TIMEOUT_SECS}][date:\"{cutoff}\"];");
        let text = std::iter::once(header)
            .chain(trails.into_iter().map(|(relation, checked)| {
                format!(
                    "(relation({}); >>;); wr._(newer:\"{checked}\"); out ids qt;",
                    relation.number()
                )
            }))
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            kind: QueryKind::Changes,
            text,
        }
    }

    /// Download a relation with its sub-relations, ways and nodes, with
    /// metadata and geometry. Without `as_of` the current state is fetched.
    #[must_use]
    pub fn relation_snapshot(relation: ElementId, as_of: Option<Timestamp>) -> Self {
        let date = as_of.map(|at| format!("[date:\"{at}\"]")).unwrap_or_default();
        let text = format!(
            "[out:json]{date};\n\
             relation(id:{id}); out meta;\n\
             >>;\n\
             rel._; out meta;\n\
             way(r); out meta geom;\n\
             node(r); out meta geom;",
            id = relation.number(),
        );
        Self {
            kind: QueryKind::Relation(relation),
            text,
        }
    }

    /// Fetch every element any schema selector accepts inside `tile`, with
    /// centres for ways and relations.
    #[must_use]
    pub fn poi_tile(tile: Tile, schema: &PoiSchema, cutoff: Timestamp) -> Self {
        let bounds = tile.bounds();
        let (min, max) = (bounds.min(), bounds.max());
        let selectors: String = schema
            .types()
            .iter()
            .map(|poi_type| format!("  {};\n", poi_type.selector))
            .collect();
        let text = format!(
            "[out:json][date:\"{cutoff}\"][bbox:{},{},{},{}];\n(\n{selectors});\nout center meta;",
            min.y, min.x, max.y, max.x
        );
        Self {
            kind: QueryKind::PoiTile(tile),
            text,
        }
    }

    /// Query shape.
    #[must_use]
    pub const fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for OverpassQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
