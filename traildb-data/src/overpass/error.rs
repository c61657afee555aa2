//! Error types produced while talking to the Overpass API.

use std::io;

use thiserror::Error;
use traildb_core::Timestamp;

/// Transport-level errors encountered while issuing a query.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The configured endpoint is not a valid URL.
    #[error("invalid Overpass endpoint {url:?}: {source}")]
    InvalidEndpoint {
        /// Endpoint as configured.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// Builder error.
        source: reqwest::Error,
    },
    /// The service asked us to slow down.
    #[error("request to {url} was rate limited with status {status}")]
    RateLimited {
        /// Request URL.
        url: String,
        /// HTTP status code, `429` or `504`.
        status: u16,
    },
    /// The server returned an HTTP error status.
    #[error("request to {url} failed with status {status}: {message}")]
    Http {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Short error description.
        message: String,
    },
    /// The request failed due to an I/O error.
    #[error("network error contacting {url}: {source}")]
    Network {
        /// Request URL.
        url: String,
        /// I/O error reported by the transport.
        source: io::Error,
    },
    /// The response body was not Overpass JSON.
    #[error("failed to decode response from {url}: {message}")]
    Decode {
        /// Request URL.
        url: String,
        /// Decoder message.
        message: String,
    },
}

impl TransportError {
    /// Whether the request may succeed if repeated after a pause.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Errors surfaced by [`super::Overpass`] once retries are accounted for.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OverpassError {
    /// A query failed for a reason pausing will not fix.
    #[error("Overpass query failed: {source}")]
    Transport {
        /// Underlying transport error.
        source: TransportError,
    },
    /// The service kept rate limiting until the retry budget ran out.
    #[error("Overpass query still rate limited after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Requests issued.
        attempts: u32,
        /// Last rate-limit error.
        source: TransportError,
    },
    /// The service data stayed older than the requested cutoff.
    #[error("Overpass data at {base:?} is still older than {cutoff} after {attempts} attempts")]
    StaleData {
        /// Requests issued.
        attempts: u32,
        /// Last reported base timestamp.
        base: Option<Timestamp>,
        /// Requested cutoff.
        cutoff: Timestamp,
    },
}
