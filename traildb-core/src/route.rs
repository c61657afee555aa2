//! Route assembly from a relation snapshot.
//!
//! A trail is routable when the member ways of its relation (including the
//! ways of nested sub-relations) chain end to end into one continuous line.

use std::collections::{HashMap, HashSet};

use geo::{Coord, Haversine, Length, LineString};
use log::debug;

use crate::{
    element::{Element, ElementId, ElementKind, Member},
    trail::TrailStats,
};

/// Member roles that are not part of the main route.
const SKIPPED_ROLES: [&str; 3] = ["alternative", "excursion", "approach"];

#[derive(Debug)]
struct WayData {
    line: Option<Vec<Coord>>,
    has_sac_scale: bool,
    has_surface: bool,
}

/// Collects relations and ways from a snapshot, one element at a time.
///
/// Nodes are dropped on arrival so a snapshot can be streamed through the
/// builder without holding its node list.
#[derive(Debug, Default)]
pub struct RouteBuilder {
    relations: HashMap<u64, Vec<Member>>,
    ways: HashMap<u64, WayData>,
}

impl RouteBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one snapshot element.
    pub fn push(&mut self, element: Element) {
        match element.kind {
            ElementKind::Node => {}
            ElementKind::Relation => {
                self.relations.insert(element.id, element.members);
            }
            ElementKind::Way => {
                let line = element
                    .geometry
                    .map(|points| points.into_iter().map(|point| point.coord()).collect());
                self.ways.insert(
                    element.id,
                    WayData {
                        line,
                        has_sac_scale: element.tags.contains_key("sac_scale"),
                        has_surface: element.tags.contains_key("surface"),
                    },
                );
            }
        }
    }

    /// Assemble the route of `relation`.
    #[must_use]
    pub fn finish(self, relation: ElementId) -> RouteAnalysis {
        if relation.kind() != ElementKind::Relation || !self.relations.contains_key(&relation.number()) {
            debug!("relation {relation} missing from snapshot");
            return RouteAnalysis::unroutable(TrailStats::default());
        }
        let mut visited = HashSet::from([relation.number()]);
        let mut way_ids = Vec::new();
        self.collect_ways(relation.number(), &mut visited, &mut way_ids);

        let stats = self.statistics(&way_ids);
        match self.chain(&way_ids) {
            Some(line) => RouteAnalysis {
                routable: true,
                line: line.into(),
                stats,
            },
            None => RouteAnalysis::unroutable(stats),
        }
    }

    fn collect_ways(&self, relation: u64, visited: &mut HashSet<u64>, out: &mut Vec<u64>) {
        let Some(members) = self.relations.get(&relation) else {
            return;
        };
        for member in members {
            if SKIPPED_ROLES.contains(&member.role.as_str()) {
                continue;
            }
            match member.kind {
                ElementKind::Way => out.push(member.reference),
                ElementKind::Relation => {
                    if visited.insert(member.reference) {
                        self.collect_ways(member.reference, visited, out);
                    }
                }
                ElementKind::Node => {}
            }
        }
    }

    fn chain(&self, way_ids: &[u64]) -> Option<Vec<Coord>> {
        let mut line: Vec<Coord> = Vec::new();
        let mut single_way = false;
        for way_id in way_ids {
            let coords = self.ways.get(way_id)?.line.as_ref()?;
            let (Some(first), Some(last)) = (coords.first(), coords.last()) else {
                return None;
            };
            if line.is_empty() {
                line.clone_from(coords);
                single_way = true;
                continue;
            }
            if single_way
                && line.last() != Some(first)
                && line.last() != Some(last)
                && (line.first() == Some(first) || line.first() == Some(last))
            {
                line.reverse();
            }
            single_way = false;
            if line.last() == Some(first) {
                line.extend(coords.iter().skip(1));
            } else if line.last() == Some(last) {
                line.extend(coords.iter().rev().skip(1));
            } else {
                debug!("way {way_id} does not connect to the route");
                return None;
            }
        }
        (!line.is_empty()).then_some(line)
    }

    fn statistics(&self, way_ids: &[u64]) -> TrailStats {
        let mut total = 0.0;
        let mut sac_scale = 0.0;
        let mut surface = 0.0;
        for way in way_ids.iter().filter_map(|id| self.ways.get(id)) {
            let Some(coords) = &way.line else {
                continue;
            };
            let length = Haversine.length(&LineString::from(coords.clone()));
            total += length;
            if way.has_sac_scale {
                sac_scale += length;
            }
            if way.has_surface {
                surface += length;
            }
        }
        TrailStats {
            length_m: total,
            ascent_m: None,
            descent_m: None,
            sac_scale_pct: percentage(sac_scale, total),
            surface_pct: percentage(surface, total),
        }
    }
}

fn percentage(part: f64, total: f64) -> u8 {
    if total <= 0.0 {
        return 0;
    }
    (part / total * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Outcome of route assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAnalysis {
    routable: bool,
    line: LineString,
    stats: TrailStats,
}

impl RouteAnalysis {
    /// Assemble the route of `relation` from a full element list.
    #[must_use]
    pub fn from_elements<I>(relation: ElementId, elements: I) -> Self
    where
        I: IntoIterator<Item = Element>,
    {
        let mut builder = RouteBuilder::new();
        for element in elements {
            builder.push(element);
        }
        builder.finish(relation)
    }

    fn unroutable(stats: TrailStats) -> Self {
        Self {
            routable: false,
            line: LineString::new(Vec::new()),
            stats,
        }
    }

    /// Whether the member ways form one continuous line.
    #[must_use]
    pub const fn is_routable(&self) -> bool {
        self.routable
    }

    /// Chained route line; empty when unroutable.
    #[must_use]
    pub const fn line(&self) -> &LineString {
        &self.line
    }

    /// Route statistics without elevation.
    #[must_use]
    pub const fn stats(&self) -> TrailStats {
        self.stats
    }

    /// Consume the analysis, returning the line.
    #[must_use]
    pub fn into_line(self) -> LineString {
        self.line
    }
}
