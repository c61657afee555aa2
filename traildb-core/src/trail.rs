//! Trail records and their derived routability status.
//!
//! A [`TrailRecord`] is one entry of the trail index. Its [`TrailStatus`] is
//! never stored: it is recomputed from the routable and checked dates plus
//! the two quality percentages whenever it is needed, and only written out
//! for readers of the index.

use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize, Serializer, ser::SerializeStruct};

use crate::{element::ElementId, timestamp::Timestamp};

/// Identifier of a trail in the index.
///
/// # Examples
/// ```
/// use traildb_core::TrailId;
///
/// let id = TrailId::new("via-alpina-red");
/// assert_eq!(id.as_ref(), "via-alpina-red");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrailId(String);

impl TrailId {
    /// Construct a new [`TrailId`] from an owned or borrowed string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Consume the wrapper and return the inner [`String`].
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for TrailId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for TrailId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for TrailId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TrailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Four-state routability status derived from a record's dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailStatus {
    /// The relation has never formed a continuous route.
    Unroutable,
    /// The latest check found a continuous route.
    Routable,
    /// The stored route was routable once but the latest check was not.
    Broken,
    /// Routable, with full `sac_scale` and `surface` coverage.
    Complete,
}

impl TrailStatus {
    /// Derive the status from the routable date, checked date and the two
    /// quality percentages.
    ///
    /// # Examples
    /// ```
    /// use traildb_core::{Timestamp, TrailStatus};
    ///
    /// let day: Timestamp = "2024-01-01".parse().expect("valid date");
    /// assert_eq!(TrailStatus::derive(None, Some(day), 100, 100), TrailStatus::Unroutable);
    /// assert_eq!(TrailStatus::derive(Some(day), Some(day), 100, 100), TrailStatus::Complete);
    /// ```
    #[must_use]
    pub fn derive(
        routable: Option<Timestamp>,
        checked: Option<Timestamp>,
        sac_scale_pct: u8,
        surface_pct: u8,
    ) -> Self {
        match routable {
            None => Self::Unroutable,
            Some(date) if Some(date) == checked => {
                if sac_scale_pct == 100 && surface_pct == 100 {
                    Self::Complete
                } else {
                    Self::Routable
                }
            }
            Some(_) => Self::Broken,
        }
    }

    /// Every status, in display order.
    pub const ALL: [Self; 4] = [
        Self::Unroutable,
        Self::Routable,
        Self::Broken,
        Self::Complete,
    ];
}

impl fmt::Display for TrailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unroutable => "unroutable",
            Self::Routable => "routable",
            Self::Broken => "broken",
            Self::Complete => "complete",
        })
    }
}

/// Route statistics stored on a record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrailStats {
    /// Route length in metres.
    pub length_m: f64,
    /// Total climb in metres, when elevation is known.
    pub ascent_m: Option<f64>,
    /// Total descent in metres, when elevation is known.
    pub descent_m: Option<f64>,
    /// Share of the length carrying a `sac_scale` tag.
    pub sac_scale_pct: u8,
    /// Share of the length carrying a `surface` tag.
    pub surface_pct: u8,
}

/// Minimal fields required to register a trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTrail {
    /// Index id.
    #[serde(rename = "srId")]
    pub id: TrailId,
    /// Display name.
    #[serde(rename = "srName")]
    pub name: String,
    /// Display colour.
    #[serde(rename = "srColor", default)]
    pub color: Option<String>,
    /// Tracked route relation.
    #[serde(rename = "osmId")]
    pub relation: ElementId,
    /// Wikidata item.
    #[serde(rename = "wikidataId", default)]
    pub wikidata: Option<String>,
}

/// One entry of the trail index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrailRecord {
    /// Index id.
    #[serde(rename = "srId")]
    pub id: TrailId,
    /// Display name.
    #[serde(rename = "srName")]
    pub name: String,
    /// Display colour.
    #[serde(rename = "srColor", default)]
    pub color: Option<String>,
    /// Tracked route relation.
    #[serde(rename = "osmId")]
    pub relation: ElementId,
    /// Wikidata item.
    #[serde(rename = "wikidataId", default)]
    pub wikidata: Option<String>,
    #[serde(rename = "checkedDate", default, with = "crate::timestamp::empty_as_none")]
    checked: Option<Timestamp>,
    #[serde(rename = "cachedDate", default, with = "crate::timestamp::empty_as_none")]
    cached: Option<Timestamp>,
    #[serde(rename = "routableDate", default, with = "crate::timestamp::empty_as_none")]
    routable: Option<Timestamp>,
    #[serde(flatten)]
    stats: StoredStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
struct StoredStats {
    #[serde(default)]
    length: f64,
    #[serde(default, deserialize_with = "unknown_as_none")]
    ascent: Option<f64>,
    #[serde(default, deserialize_with = "unknown_as_none")]
    descent: Option<f64>,
    #[serde(rename = "sacScalePct", default)]
    sac_scale_pct: u8,
    #[serde(rename = "surfacePct", default)]
    surface_pct: u8,
}

/// Older indexes mark unknown climb as `-1`.
fn unknown_as_none<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<f64>, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|metres| *metres >= 0.0))
}

impl TrailRecord {
    /// Create the record of a freshly registered trail: no dates, no stats.
    #[must_use]
    pub fn register(trail: NewTrail) -> Self {
        Self {
            id: trail.id,
            name: trail.name,
            color: trail.color,
            relation: trail.relation,
            wikidata: trail.wikidata,
            checked: None,
            cached: None,
            routable: None,
            stats: StoredStats::default(),
        }
    }

    /// Derived status.
    #[must_use]
    pub fn status(&self) -> TrailStatus {
        TrailStatus::derive(
            self.routable,
            self.checked,
            self.stats.sac_scale_pct,
            self.stats.surface_pct,
        )
    }

    /// Whether the last check confirmed the stored route.
    ///
    /// Unlike [`TrailRecord::status`] this ignores the quality percentages,
    /// so both `routable` and `complete` records count.
    #[must_use]
    pub fn is_fresh_routable(&self) -> bool {
        self.routable.is_some() && self.routable == self.checked
    }

    /// Whether the trail was never synchronised.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.cached.is_none()
    }

    /// When the relation was last checked.
    #[must_use]
    pub const fn checked_date(&self) -> Option<Timestamp> {
        self.checked
    }

    /// When the stored snapshot was captured.
    #[must_use]
    pub const fn cached_date(&self) -> Option<Timestamp> {
        self.cached
    }

    /// When the relation was last found routable.
    #[must_use]
    pub const fn routable_date(&self) -> Option<Timestamp> {
        self.routable
    }

    /// Stored route statistics.
    #[must_use]
    pub const fn stats(&self) -> TrailStats {
        TrailStats {
            length_m: self.stats.length,
            ascent_m: self.stats.ascent,
            descent_m: self.stats.descent,
            sac_scale_pct: self.stats.sac_scale_pct,
            surface_pct: self.stats.surface_pct,
        }
    }

    /// A routable snapshot was stored at `at`.
    pub fn mark_routable(&mut self, stats: TrailStats, at: Timestamp) {
        self.set_stats(stats);
        self.cached = Some(at);
        self.routable = Some(at);
        self.checked = Some(at);
    }

    /// An unroutable snapshot replaced the stored one at `at`.
    pub fn mark_unroutable(&mut self, stats: TrailStats, at: Timestamp) {
        self.set_stats(TrailStats {
            ascent_m: None,
            descent_m: None,
            ..stats
        });
        self.cached = Some(at);
        self.routable = None;
        self.checked = Some(at);
    }

    /// The relation was checked at `at`; the stored snapshot is unchanged.
    pub fn mark_checked(&mut self, at: Timestamp) {
        self.checked = Some(at);
    }

    /// Advance the dates to the run cutoff. `routable` also advances the
    /// routable date.
    pub fn roll_forward(&mut self, at: Timestamp, routable: bool) {
        self.checked = Some(at);
        if routable {
            self.routable = Some(at);
        }
    }

    fn set_stats(&mut self, stats: TrailStats) {
        self.stats = StoredStats {
            length: stats.length_m,
            ascent: stats.ascent_m,
            descent: stats.descent_m,
            sac_scale_pct: stats.sac_scale_pct,
            surface_pct: stats.surface_pct,
        };
    }
}

/// Index field order.
impl Serialize for TrailRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = serializer.serialize_struct("TrailRecord", 14)?;
        out.serialize_field("srId", &self.id)?;
        out.serialize_field("srName", &self.name)?;
        match &self.color {
            Some(color) => out.serialize_field("srColor", color)?,
            None => out.skip_field("srColor")?,
        }
        out.serialize_field("osmId", &self.relation)?;
        match &self.wikidata {
            Some(wikidata) => out.serialize_field("wikidataId", wikidata)?,
            None => out.skip_field("wikidataId")?,
        }
        out.serialize_field("status", &self.status())?;
        match self.checked {
            Some(checked) => out.serialize_field("checkedDate", &checked)?,
            None => out.skip_field("checkedDate")?,
        }
        match self.cached {
            Some(cached) => out.serialize_field("cachedDate", &cached)?,
            None => out.skip_field("cachedDate")?,
        }
        out.serialize_field("routableDate", &EmptyOr(self.routable))?;
        out.serialize_field("ascent", &self.stats.ascent)?;
        out.serialize_field("descent", &self.stats.descent)?;
        out.serialize_field("length", &self.stats.length)?;
        out.serialize_field("sacScalePct", &self.stats.sac_scale_pct)?;
        out.serialize_field("surfacePct", &self.stats.surface_pct)?;
        out.end()
    }
}

struct EmptyOr(Option<Timestamp>);

impl Serialize for EmptyOr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::timestamp::empty_as_none::serialize(&self.0, serializer)
    }
}
