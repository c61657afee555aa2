//! Synchronising trail records with the remote relations.
//!
//! [`StatusMachine`] moves a record's dates for an assembled route.
//! [`TrailSync::synchronize`] feeds it a fresh download;
//! [`TrailSync::update_trails`] does so for every trail a change query
//! flags, then rolls every record forward to the run cutoff.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use log::{debug, info};
use thiserror::Error;
use traildb_core::{
    ElevationError, ElevationSource, RouteAnalysis, Timestamp, TrailId, TrailStats, climb,
};

use crate::{
    changes::{ChangeError, Changes, detect_changes},
    overpass::{Overpass, OverpassError, OverpassQuery, OverpassSource},
    store::{Snapshot, StoreError, TrailDatabase},
};

/// Errors raised while synchronising trails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    /// Downloading a relation failed.
    #[error(transparent)]
    Overpass(#[from] OverpassError),
    /// Detecting changes failed.
    #[error(transparent)]
    Changes(#[from] ChangeError),
    /// Reading or writing the database failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Elevation enrichment failed.
    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

/// What one synchronisation did to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The relation is routable; its snapshot replaced the stored one.
    Routable,
    /// The relation is not routable but the trail was routable before, so
    /// the last good snapshot is kept and only the check date moves.
    KeptPrevious,
    /// The relation is not routable; its snapshot replaced the stored one.
    Unroutable,
}

/// Summary of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Run cutoff.
    pub cutoff: Timestamp,
    /// Trails imported for the first time.
    pub imported: Vec<TrailId>,
    /// Whether the service data predated the cutoff, making the run a no-op.
    pub stale: bool,
    /// Trails re-synchronised because their relation changed.
    pub updated: Vec<TrailId>,
    /// Trails fresh-routable before the run and not after it.
    pub broken: Vec<TrailId>,
    /// Trails fresh-routable after the run and not before it.
    pub fixed: Vec<TrailId>,
}

impl UpdateReport {
    fn stale(cutoff: Timestamp, imported: Vec<TrailId>) -> Self {
        Self {
            cutoff,
            imported,
            stale: true,
            updated: Vec::new(),
            broken: Vec::new(),
            fixed: Vec::new(),
        }
    }
}

fn join(ids: &[TrailId]) -> String {
    ids.iter().map(TrailId::as_ref).collect::<Vec<_>>().join(" ")
}

/// One-line run summary, e.g. `[2024-02-01] [trails] (BROKEN: gr5) gr5 gr10`.
impl fmt::Display for UpdateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [trails]", self.cutoff.into_inner().format("%Y-%m-%d"))?;
        if self.stale {
            return f.write_str(" stale data, no update");
        }
        if !self.broken.is_empty() {
            write!(f, " (BROKEN: {})", join(&self.broken))?;
        }
        if !self.fixed.is_empty() {
            write!(f, " (FIXED: {})", join(&self.fixed))?;
        }
        if self.updated.is_empty() {
            f.write_str(" no updates")
        } else {
            write!(f, " {}", join(&self.updated))
        }
    }
}

/// Applies an assembled route to its index record.
///
/// A routable route always replaces the stored snapshot. A non-routable one
/// only does so for trails that were never routable, or when forced;
/// otherwise the record just notes the failed check and turns broken.
#[derive(Clone, Copy)]
pub struct StatusMachine<'a> {
    elevation: &'a dyn ElevationSource,
}

/// Drives trail synchronisation against an Overpass client.
pub struct TrailSync<'a, S> {
    overpass: &'a Overpass<S>,
    machine: StatusMachine<'a>,
}

impl<'a, S: OverpassSource> TrailSync<'a, S> {
    /// Synchroniser using `overpass` for downloads and `elevation` for climb.
    pub fn new(overpass: &'a Overpass<S>, elevation: &'a dyn ElevationSource) -> Self {
        Self {
            overpass,
            machine: StatusMachine::new(elevation),
        }
    }

    /// Download the relation of trail `id` (as of `as_of`, or now), apply
    /// the result to its record and checkpoint the index.
    ///
    /// `force` replaces a previously routable snapshot even when the new
    /// download is not routable.
    pub async fn synchronize(
        &self,
        db: &mut TrailDatabase,
        id: &TrailId,
        force: bool,
        as_of: Option<Timestamp>,
    ) -> Result<SyncOutcome, SyncError> {
        let relation = db.get(id)?.relation;
        let response = self
            .overpass
            .query(&OverpassQuery::relation_snapshot(relation, as_of))
            .await?;
        let at = as_of
            .or(response.base_timestamp)
            .unwrap_or_else(Timestamp::now);
        let analysis = RouteAnalysis::from_elements(relation, response.elements.iter().cloned());
        let snapshot = Snapshot::new(at, response.elements);
        let outcome = self
            .machine
            .apply(db, id, &analysis, at, force, Some(&snapshot))?;
        db.save_index()?;
        Ok(outcome)
    }

    /// Import every never-synchronised trail, forcing the snapshot write.
    pub async fn import_new(&self, db: &mut TrailDatabase) -> Result<Vec<TrailId>, SyncError> {
        let fresh: Vec<TrailId> = db
            .trails()
            .iter()
            .filter(|trail| trail.is_new())
            .map(|trail| trail.id.clone())
            .collect();
        for id in &fresh {
            info!("importing new trail {id}");
            self.synchronize(db, id, true, None).await?;
        }
        Ok(fresh)
    }

    /// Full update run up to `cutoff`.
    ///
    /// New trails are imported first. When the change query reports stale
    /// data nothing else happens. Otherwise each affected trail is
    /// re-synchronised as of the cutoff, broken and fixed trails are
    /// recorded, and every record is rolled forward to the cutoff.
    pub async fn update_trails(
        &self,
        db: &mut TrailDatabase,
        cutoff: Timestamp,
    ) -> Result<UpdateReport, SyncError> {
        let imported = self.import_new(db).await?;
        let affected = match detect_changes(db, self.overpass, cutoff).await? {
            Changes::Stale { .. } => {
                let report = UpdateReport::stale(cutoff, imported);
                info!("{report}");
                return Ok(report);
            }
            Changes::Fresh { affected, .. } => affected,
        };

        let before = fresh_routability(db, &affected)?;
        for (position, id) in affected.iter().enumerate() {
            info!("updating trail {id} ({}/{})", position + 1, affected.len());
            self.synchronize(db, id, false, Some(cutoff)).await?;
        }
        let after = fresh_routability(db, &affected)?;

        let broken = transitions(&before, &after, true);
        let fixed = transitions(&before, &after, false);

        for trail in db.trails_mut() {
            let routable = after
                .get(&trail.id)
                .copied()
                .unwrap_or_else(|| trail.is_fresh_routable());
            trail.roll_forward(cutoff, routable);
        }
        db.save_index()?;

        let report = UpdateReport {
            cutoff,
            imported,
            stale: false,
            updated: affected.into_iter().collect(),
            broken,
            fixed,
        };
        info!("{report}");
        Ok(report)
    }
}

impl<'a> StatusMachine<'a> {
    /// Machine enriching routable routes with climb from `elevation`.
    pub const fn new(elevation: &'a dyn ElevationSource) -> Self {
        Self { elevation }
    }

    /// Re-derive every synchronised record from its stored snapshot,
    /// without contacting the service.
    ///
    /// Dates move to the snapshot capture timestamp, except that a later
    /// check date survives so broken trails stay broken.
    pub fn recalculate_stats(&self, db: &mut TrailDatabase) -> Result<usize, SyncError> {
        let mut recalculated = 0;
        for id in db.trail_ids() {
            let trail = db.get(&id)?.clone();
            if trail.is_new() {
                debug!("trail {id} has no snapshot yet");
                continue;
            }
            let stored = db.load_route(&trail)?;
            let Some(at) = stored.capture_timestamp.or(trail.cached_date()) else {
                debug!("trail {id} has no capture timestamp");
                continue;
            };
            self.apply(db, &id, &stored.analysis, at, false, None)?;
            if let Some(checked) = trail.checked_date().filter(|checked| *checked > at) {
                db.get_mut(&id)?.mark_checked(checked);
            }
            db.save_index()?;
            recalculated += 1;
        }
        info!("recalculated {recalculated} trails");
        Ok(recalculated)
    }

    /// Apply `analysis`, taken at `at`, to trail `id` without saving the
    /// index. `snapshot` is written whenever the route replaces the stored one.
    pub fn apply(
        &self,
        db: &mut TrailDatabase,
        id: &TrailId,
        analysis: &RouteAnalysis,
        at: Timestamp,
        force: bool,
        snapshot: Option<&Snapshot>,
    ) -> Result<SyncOutcome, SyncError> {
        let outcome = if analysis.is_routable() {
            let stats = self.with_climb(analysis)?;
            if let Some(snapshot) = snapshot {
                db.write_snapshot(id, snapshot)?;
            }
            db.get_mut(id)?.mark_routable(stats, at);
            SyncOutcome::Routable
        } else if db.get(id)?.routable_date().is_some() && !force {
            db.get_mut(id)?.mark_checked(at);
            SyncOutcome::KeptPrevious
        } else {
            if let Some(snapshot) = snapshot {
                db.write_snapshot(id, snapshot)?;
            }
            db.get_mut(id)?.mark_unroutable(analysis.stats(), at);
            SyncOutcome::Unroutable
        };
        debug!("trail {id}: {outcome:?} at {at}");
        Ok(outcome)
    }

    fn with_climb(&self, analysis: &RouteAnalysis) -> Result<TrailStats, ElevationError> {
        let samples = self.elevation.attach(analysis.line())?;
        let (ascent_m, descent_m) = climb(&samples).unzip();
        Ok(TrailStats {
            ascent_m,
            descent_m,
            ..analysis.stats()
        })
    }
}

fn fresh_routability(
    db: &TrailDatabase,
    ids: &BTreeSet<TrailId>,
) -> Result<BTreeMap<TrailId, bool>, StoreError> {
    ids.iter()
        .map(|id| Ok((id.clone(), db.get(id)?.is_fresh_routable())))
        .collect()
}

fn transitions(
    before: &BTreeMap<TrailId, bool>,
    after: &BTreeMap<TrailId, bool>,
    from: bool,
) -> Vec<TrailId> {
    before
        .iter()
        .filter(|&(id, &was)| was == from && after.get(id) == Some(&!from))
        .map(|(id, _)| id.clone())
        .collect()
}
