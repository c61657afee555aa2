//! Overpass client settings shared by the downloading subcommands.

use std::time::Duration;

use traildb_core::Timestamp;
use traildb_data::{HttpOverpassConfig, HttpOverpassSource, Overpass, Throttle};

use crate::CliError;

/// Raw remote options as merged from CLI, environment and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RemoteOptions {
    pub(crate) endpoint: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) pause_secs: Option<u64>,
    pub(crate) rate_limit_pause_secs: Option<u64>,
    pub(crate) max_retries: Option<u32>,
    pub(crate) cutoff: Option<String>,
}

/// Resolved client settings and run cutoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RemoteConfig {
    pub(crate) http: HttpOverpassConfig,
    pub(crate) throttle: Throttle,
    pub(crate) cutoff: Timestamp,
}

impl RemoteConfig {
    /// Fill unset options from `throttle` and the library defaults; the
    /// cutoff defaults to the start of the day before `now`.
    pub(crate) fn resolve(
        options: RemoteOptions,
        throttle: Throttle,
        now: Timestamp,
    ) -> Result<Self, CliError> {
        let mut http = options
            .endpoint
            .map_or_else(HttpOverpassConfig::default, HttpOverpassConfig::new);
        if let Some(user_agent) = options.user_agent {
            http = http.with_user_agent(user_agent);
        }
        if let Some(secs) = options.timeout_secs {
            http = http.with_timeout(Duration::from_secs(secs));
        }

        let mut throttle = throttle;
        if let Some(secs) = options.pause_secs {
            throttle = throttle.with_pause(Duration::from_secs(secs));
        }
        if let Some(secs) = options.rate_limit_pause_secs {
            throttle = throttle.with_rate_limit_pause(Duration::from_secs(secs));
        }
        if let Some(retries) = options.max_retries {
            throttle = throttle.with_max_retries(retries);
        }

        let cutoff = match options.cutoff {
            Some(raw) => raw.parse()?,
            None => Timestamp::start_of_previous_day(now),
        };
        Ok(Self {
            http,
            throttle,
            cutoff,
        })
    }

    /// Build the paced HTTP client.
    pub(crate) fn client(&self) -> Result<Overpass<HttpOverpassSource>, CliError> {
        let source = HttpOverpassSource::new(self.http.clone())?;
        Ok(Overpass::new(source, self.throttle))
    }
}
