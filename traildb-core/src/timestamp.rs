//! Second-precision UTC instants in the Overpass `YYYY-MM-DDTHH:MM:SSZ` form.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Days, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A UTC instant as exchanged with the Overpass API and stored in the index.
///
/// # Examples
/// ```
/// use traildb_core::Timestamp;
///
/// let ts: Timestamp = "2024-01-01T00:00:00Z".parse().expect("valid timestamp");
/// let day: Timestamp = "2024-01-01".parse().expect("date-only input");
/// assert_eq!(ts, day);
/// assert_eq!(ts.to_string(), "2024-01-01T00:00:00Z");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

/// Errors raised when parsing a [`Timestamp`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {input:?}: expected RFC 3339 or YYYY-MM-DD")]
pub struct TimestampError {
    input: String,
}

impl Timestamp {
    /// Wrap a `chrono` instant, dropping sub-second precision.
    #[must_use]
    pub fn new(instant: DateTime<Utc>) -> Self {
        let seconds = instant.timestamp();
        Self(DateTime::from_timestamp(seconds, 0).unwrap_or(instant))
    }

    /// Current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Midnight UTC at the start of the day before `now`.
    ///
    /// Used as the default cutoff of a daily run: the diff service is asked
    /// about everything up to the start of yesterday.
    #[must_use]
    pub fn start_of_previous_day(now: Self) -> Self {
        let today = now.0.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        Self(yesterday.and_time(NaiveTime::MIN).and_utc())
    }

    /// Underlying `chrono` value.
    #[must_use]
    pub const fn into_inner(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::new(instant)
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
            return Ok(Self::new(parsed.with_timezone(&Utc)));
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(|date| Self(date.and_time(NaiveTime::MIN).and_utc()))
            .map_err(|_| TimestampError {
                input: input.to_owned(),
            })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde adapter storing `Option<Timestamp>` as a string, `""` when unset.
pub mod empty_as_none {
    use super::Timestamp;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialise `None` as `""`.
    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(timestamp) => serializer.collect_str(timestamp),
            None => serializer.serialize_str(""),
        }
    }

    /// Read `""`, `null` or a missing field as `None`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref() {
            None | Some("") => Ok(None),
            Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}
