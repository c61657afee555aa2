//! Test doubles for the Overpass client.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    future::Future,
};

use async_trait::async_trait;
use traildb_core::{Element, ElementId, Tile, Timestamp};

use crate::overpass::{OverpassQuery, OverpassResponse, OverpassSource, QueryKind, TransportError};

/// In-memory [`OverpassSource`] answering from configured data.
///
/// Queued failures are returned first, one per query. Otherwise change
/// queries report the configured changed ids, relation queries return the
/// configured snapshot of that relation and tile queries the configured
/// tile contents; anything unconfigured comes back empty. Every response
/// carries the next queued base timestamp, falling back to the default.
#[derive(Debug)]
pub struct StubOverpass {
    base: Cell<Timestamp>,
    queued_bases: RefCell<VecDeque<Timestamp>>,
    failures: RefCell<VecDeque<TransportError>>,
    changed: RefCell<Vec<ElementId>>,
    relations: RefCell<HashMap<ElementId, Vec<Element>>>,
    tiles: RefCell<HashMap<Tile, Vec<Element>>>,
    queries: RefCell<Vec<OverpassQuery>>,
}

impl StubOverpass {
    /// Stub whose responses report `base` as their data freshness.
    #[must_use]
    pub fn new(base: Timestamp) -> Self {
        Self {
            base: Cell::new(base),
            queued_bases: RefCell::default(),
            failures: RefCell::default(),
            changed: RefCell::default(),
            relations: RefCell::default(),
            tiles: RefCell::default(),
            queries: RefCell::default(),
        }
    }

    /// Change the default base timestamp.
    pub fn set_base(&self, base: Timestamp) {
        self.base.set(base);
    }

    /// Use `base` for the next response only.
    pub fn queue_base(&self, base: Timestamp) {
        self.queued_bases.borrow_mut().push_back(base);
    }

    /// Fail the next query with `error`.
    pub fn push_failure(&self, error: TransportError) {
        self.failures.borrow_mut().push_back(error);
    }

    /// Ids reported by change queries.
    pub fn set_changed(&self, ids: impl IntoIterator<Item = ElementId>) {
        *self.changed.borrow_mut() = ids.into_iter().collect();
    }

    /// Elements returned when `relation` is downloaded.
    pub fn set_relation(&self, relation: ElementId, elements: Vec<Element>) {
        self.relations.borrow_mut().insert(relation, elements);
    }

    /// Elements returned for `tile`.
    pub fn set_tile(&self, tile: Tile, elements: Vec<Element>) {
        self.tiles.borrow_mut().insert(tile, elements);
    }

    /// Queries received so far, failures included.
    #[must_use]
    pub fn queries(&self) -> Vec<OverpassQuery> {
        self.queries.borrow().clone()
    }
}

#[async_trait(?Send)]
impl OverpassSource for StubOverpass {
    fn endpoint(&self) -> &str {
        "https://overpass.test/api/interpreter"
    }

    async fn run(&self, query: &OverpassQuery) -> Result<OverpassResponse, TransportError> {
        self.queries.borrow_mut().push(query.clone());
        if let Some(error) = self.failures.borrow_mut().pop_front() {
            return Err(error);
        }
        let elements = match query.kind() {
            QueryKind::Changes => self.changed.borrow().iter().copied().map(Element::new).collect(),
            QueryKind::Relation(relation) => {
                self.relations.borrow().get(relation).cloned().unwrap_or_default()
            }
            QueryKind::PoiTile(tile) => self.tiles.borrow().get(tile).cloned().unwrap_or_default(),
        };
        let base = self
            .queued_bases
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.base.get());
        Ok(OverpassResponse::new(Some(base), elements))
    }
}

/// Drive `future` to completion on a current-thread runtime with timers.
///
/// # Panics
/// Panics if the runtime cannot be created.
pub fn block_on_for_tests<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap_or_else(|err| panic!("failed to build test runtime: {err}"))
        .block_on(future)
}
