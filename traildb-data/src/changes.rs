//! Mapping remote modifications back to the trails they touch.
//!
//! One combined query asks, for every checked trail, which elements of its
//! relation tree changed since the trail's check date. The reported ids are
//! looked up in a reverse index built from the stored snapshots: an element
//! shared by several trails marks all of them.

use std::collections::{BTreeSet, HashMap};

use log::{debug, info};
use thiserror::Error;
use traildb_core::{ElementId, Timestamp, TrailId};

use crate::{
    overpass::{Overpass, OverpassError, OverpassQuery, OverpassSource},
    store::{StoreError, TrailDatabase},
};

/// Errors raised while detecting changes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChangeError {
    /// The change query failed.
    #[error(transparent)]
    Overpass(#[from] OverpassError),
    /// A stored snapshot could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reverse index from element id to the trails whose snapshot contains it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementIndex {
    trails_by_element: HashMap<ElementId, Vec<TrailId>>,
}

impl ElementIndex {
    /// Empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `trail`'s snapshot contains `ids`.
    pub fn insert<I>(&mut self, trail: &TrailId, ids: I)
    where
        I: IntoIterator<Item = ElementId>,
    {
        for id in ids {
            let trails = self.trails_by_element.entry(id).or_default();
            if !trails.contains(trail) {
                trails.push(trail.clone());
            }
        }
    }

    /// Index every stored snapshot of `db`. Trails never synchronised have
    /// no snapshot and are skipped.
    pub fn build(db: &TrailDatabase) -> Result<Self, StoreError> {
        let mut index = Self::new();
        for trail in db.trails().iter().filter(|trail| !trail.is_new()) {
            index.insert(&trail.id, db.element_ids(&trail.id)?);
        }
        debug!("indexed {} elements", index.len());
        Ok(index)
    }

    /// Trails containing `id`.
    #[must_use]
    pub fn trails_for(&self, id: &ElementId) -> &[TrailId] {
        self.trails_by_element.get(id).map_or(&[], Vec::as_slice)
    }

    /// Union of the trails containing any of `changed`. Ids no trail
    /// contains are ignored.
    pub fn affected<'a, I>(&self, changed: I) -> BTreeSet<TrailId>
    where
        I: IntoIterator<Item = &'a ElementId>,
    {
        changed
            .into_iter()
            .flat_map(|id| self.trails_for(id))
            .cloned()
            .collect()
    }

    /// Distinct element ids indexed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.trails_by_element.len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trails_by_element.is_empty()
    }
}

/// Outcome of a change query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Changes {
    /// The service data predates the cutoff; the run must not proceed.
    Stale {
        /// Reported base timestamp.
        base: Option<Timestamp>,
    },
    /// Changes up to the cutoff.
    Fresh {
        /// Distinct modified element ids.
        changed: BTreeSet<ElementId>,
        /// Trails containing any of them.
        affected: BTreeSet<TrailId>,
    },
}

/// Ask which trails changed between their check date and `cutoff`.
///
/// A response without a base timestamp cannot be shown to cover the cutoff
/// and counts as stale.
pub async fn detect_changes<S: OverpassSource>(
    db: &TrailDatabase,
    overpass: &Overpass<S>,
    cutoff: Timestamp,
) -> Result<Changes, ChangeError> {
    let checked: Vec<_> = db
        .trails()
        .iter()
        .filter_map(|trail| trail.checked_date().map(|checked| (trail.relation, checked)))
        .collect();
    if checked.is_empty() {
        debug!("no checked trails; skipping the change query");
        return Ok(Changes::Fresh {
            changed: BTreeSet::new(),
            affected: BTreeSet::new(),
        });
    }

    let response = overpass
        .query(&OverpassQuery::changed_elements(checked, cutoff))
        .await?;
    match response.base_timestamp {
        Some(base) if base >= cutoff => {}
        base => {
            info!(
                "Overpass data at {} predates the cutoff {cutoff}",
                base.map_or_else(|| "unknown".to_owned(), |base| base.to_string())
            );
            return Ok(Changes::Stale { base });
        }
    }

    let changed: BTreeSet<ElementId> = response
        .elements
        .iter()
        .map(traildb_core::Element::element_id)
        .collect();
    let index = ElementIndex::build(db)?;
    let affected = index.affected(&changed);
    debug!("{} changed elements touch {} trails", changed.len(), affected.len());
    Ok(Changes::Fresh { changed, affected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ids(raw: &[&str]) -> Vec<ElementId> {
        raw.iter().map(|id| id.parse().expect("valid id")).collect()
    }

    #[rstest]
    fn shared_elements_mark_every_trail() {
        let mut index = ElementIndex::new();
        index.insert(&TrailId::from("a"), ids(&["r1", "w100", "n5"]));
        index.insert(&TrailId::from("b"), ids(&["r2", "w100"]));
        index.insert(&TrailId::from("c"), ids(&["r3", "w200"]));

        let changed = ids(&["w100"]);
        let affected: Vec<String> = index.affected(&changed).iter().map(ToString::to_string).collect();

        assert_eq!(affected, ["a", "b"]);
    }

    #[rstest]
    fn unknown_ids_are_ignored() {
        let mut index = ElementIndex::new();
        index.insert(&TrailId::from("a"), ids(&["r1", "w100"]));

        assert!(index.affected(&ids(&["w999", "n1"])).is_empty());
        assert!(index.trails_for(&ElementId::relation(7)).is_empty());
    }

    #[rstest]
    fn repeated_inserts_do_not_duplicate_trails() {
        let mut index = ElementIndex::new();
        let trail = TrailId::from("a");
        index.insert(&trail, ids(&["w100"]));
        index.insert(&trail, ids(&["w100", "w101"]));

        assert_eq!(index.trails_for(&ids(&["w100"])[0]), [trail]);
        assert_eq!(index.len(), 2);
    }
}
