use std::{io, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::USER_AGENT};
use serde::Deserialize;
use traildb_core::{Element, Timestamp};
use url::Url;

use super::{OverpassQuery, TransportError};

/// Public Overpass instance used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://overpass-api.de/api/interpreter";
/// User agent sent with every query.
pub const DEFAULT_USER_AGENT: &str = "traildb/0.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);

/// Decoded Overpass JSON response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverpassResponse {
    /// Data freshness reported in `osm3s.timestamp_osm_base`.
    pub base_timestamp: Option<Timestamp>,
    /// Returned elements.
    pub elements: Vec<Element>,
}

impl OverpassResponse {
    /// Response carrying `elements` with the given base timestamp.
    #[must_use]
    pub const fn new(base_timestamp: Option<Timestamp>, elements: Vec<Element>) -> Self {
        Self {
            base_timestamp,
            elements,
        }
    }
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    osm3s: Option<Osm3s>,
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Deserialize)]
struct Osm3s {
    #[serde(default, with = "traildb_core::timestamp::empty_as_none")]
    timestamp_osm_base: Option<Timestamp>,
}

impl<'de> Deserialize<'de> for OverpassResponse {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawResponse::deserialize(deserializer)?;
        Ok(Self {
            base_timestamp: raw.osm3s.and_then(|meta| meta.timestamp_osm_base),
            elements: raw.elements,
        })
    }
}

/// Something that can run Overpass QL queries.
#[async_trait(?Send)]
pub trait OverpassSource {
    /// Endpoint queries are sent to, for diagnostics.
    fn endpoint(&self) -> &str;
    /// Run one query.
    async fn run(&self, query: &OverpassQuery) -> Result<OverpassResponse, TransportError>;
}

/// Configuration for [`HttpOverpassSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpOverpassConfig {
    /// Interpreter URL.
    pub endpoint: String,
    /// User agent header value.
    pub user_agent: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for HttpOverpassConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl HttpOverpassConfig {
    /// Configuration for `endpoint` with default user agent and timeout.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP implementation of [`OverpassSource`]; queries are POSTed as the
/// `data` form field.
#[derive(Debug)]
pub struct HttpOverpassSource {
    client: Client,
    endpoint: Url,
    user_agent: String,
}

impl HttpOverpassSource {
    /// Build a source from `config`.
    pub fn new(config: HttpOverpassConfig) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(&config.endpoint).map_err(|source| TransportError::InvalidEndpoint {
                url: config.endpoint.clone(),
                source,
            })?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(config.timeout)
            .build()
            .map_err(|source| TransportError::Client { source })?;
        Ok(Self {
            client,
            endpoint,
            user_agent: config.user_agent,
        })
    }
}

#[async_trait(?Send)]
impl OverpassSource for HttpOverpassSource {
    fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    async fn run(&self, query: &OverpassQuery) -> Result<OverpassResponse, TransportError> {
        let url = self.endpoint.as_str();
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .form(&[("data", query.as_str())])
            .send()
            .await
            .map_err(|err| convert_reqwest_error(err, url))?;
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::GATEWAY_TIMEOUT {
            return Err(TransportError::RateLimited {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        response
            .error_for_status()
            .map_err(|err| convert_reqwest_error(err, url))?
            .json::<OverpassResponse>()
            .await
            .map_err(|err| TransportError::Decode {
                url: url.to_owned(),
                message: err.to_string(),
            })
    }
}

fn convert_reqwest_error(error: reqwest::Error, url: &str) -> TransportError {
    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    let kind = if error.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };
    TransportError::Network {
        url: url.to_owned(),
        source: io::Error::new(kind, error),
    }
}
