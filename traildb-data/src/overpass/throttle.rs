use std::{cell::Cell, time::Duration};

use log::{debug, warn};
use traildb_core::Timestamp;

use super::{OverpassError, OverpassQuery, OverpassResponse, OverpassSource};

/// Pause between consecutive relation downloads.
pub const TRAIL_REQUEST_PAUSE: Duration = Duration::from_secs(20);
/// Pause after the service rate limits a request.
pub const RATE_LIMIT_PAUSE: Duration = Duration::from_secs(10);
/// Retries allowed per query.
pub const MAX_RETRIES: u32 = 10;

/// Pacing applied to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttle {
    /// Wait before each request except the first.
    pub pause: Duration,
    /// Wait after a rate-limited request before retrying it.
    pub rate_limit_pause: Duration,
    /// Retries per query, for rate limits and for stale data alike.
    pub max_retries: u32,
}

impl Default for Throttle {
    fn default() -> Self {
        Self {
            pause: Duration::ZERO,
            rate_limit_pause: RATE_LIMIT_PAUSE,
            max_retries: MAX_RETRIES,
        }
    }
}

impl Throttle {
    /// Pacing for relation downloads.
    #[must_use]
    pub fn for_trails() -> Self {
        Self::default().with_pause(TRAIL_REQUEST_PAUSE)
    }

    /// Pacing for POI tile downloads.
    #[must_use]
    pub fn for_poi_tiles() -> Self {
        Self::default()
    }

    /// Override the pause between requests.
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Override the rate-limit pause.
    #[must_use]
    pub const fn with_rate_limit_pause(mut self, pause: Duration) -> Self {
        self.rate_limit_pause = pause;
        self
    }

    /// Override the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// No waiting at all, for tests and replays.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            pause: Duration::ZERO,
            rate_limit_pause: Duration::ZERO,
            max_retries: MAX_RETRIES,
        }
    }
}

/// Paced, retrying client over an [`OverpassSource`].
///
/// Requests are strictly sequential: the service punishes parallel clients.
#[derive(Debug)]
pub struct Overpass<S> {
    source: S,
    throttle: Throttle,
    issued: Cell<u64>,
}

impl<S: OverpassSource> Overpass<S> {
    /// Wrap `source` with `throttle`.
    pub const fn new(source: S, throttle: Throttle) -> Self {
        Self {
            source,
            throttle,
            issued: Cell::new(0),
        }
    }

    /// Underlying source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Pacing in effect.
    pub const fn throttle(&self) -> Throttle {
        self.throttle
    }

    /// Requests sent so far, retries included.
    pub fn requests_issued(&self) -> u64 {
        self.issued.get()
    }

    /// Run `query`, retrying after a pause while the service rate limits it.
    pub async fn query(&self, query: &OverpassQuery) -> Result<OverpassResponse, OverpassError> {
        let mut attempts = 0_u32;
        loop {
            self.pace().await;
            attempts += 1;
            match self.source.run(query).await {
                Ok(response) => return Ok(response),
                Err(source) if source.is_rate_limited() => {
                    if attempts > self.throttle.max_retries {
                        return Err(OverpassError::RetriesExhausted { attempts, source });
                    }
                    warn!(
                        "{} rate limited ({source}); retrying in {:?}",
                        self.source.endpoint(),
                        self.throttle.rate_limit_pause
                    );
                    tokio::time::sleep(self.throttle.rate_limit_pause).await;
                }
                Err(source) => return Err(OverpassError::Transport { source }),
            }
        }
    }

    /// Run `query` until the service reports data at least as new as
    /// `cutoff`, within the retry budget.
    pub async fn query_fresh(
        &self,
        query: &OverpassQuery,
        cutoff: Timestamp,
    ) -> Result<OverpassResponse, OverpassError> {
        let mut attempts = 0_u32;
        loop {
            let response = self.query(query).await?;
            attempts += 1;
            if response.base_timestamp.is_some_and(|base| base >= cutoff) {
                return Ok(response);
            }
            if attempts > self.throttle.max_retries {
                return Err(OverpassError::StaleData {
                    attempts,
                    base: response.base_timestamp,
                    cutoff,
                });
            }
            warn!(
                "{} data at {:?} is older than {cutoff}; retrying",
                self.source.endpoint(),
                response.base_timestamp.map(|base| base.to_string())
            );
            tokio::time::sleep(self.throttle.rate_limit_pause).await;
        }
    }

    async fn pace(&self) {
        let issued = self.issued.get();
        if issued > 0 && !self.throttle.pause.is_zero() {
            debug!("pausing {:?} before the next request", self.throttle.pause);
            tokio::time::sleep(self.throttle.pause).await;
        }
        self.issued.set(issued + 1);
    }
}
