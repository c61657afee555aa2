//! Client side of the Overpass API.
//!
//! Three query shapes are issued: the change query listing modified element
//! ids per trail, the relation download used to refresh a trail snapshot,
//! and the per-tile POI query. [`Overpass`] wraps any [`OverpassSource`]
//! with the pacing and retry policy the public instances expect.

mod error;
mod query;
mod source;
mod throttle;

pub use error::{OverpassError, TransportError};
pub use query::{CHANGE_QUERY_TIMEOUT_SECS, OverpassQuery, QueryKind};
pub use source::{
    DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, HttpOverpassConfig, HttpOverpassSource,
    OverpassResponse, OverpassSource,
};
pub use throttle::{MAX_RETRIES, Overpass, RATE_LIMIT_PAUSE, TRAIL_REQUEST_PAUSE, Throttle};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{StubOverpass, block_on_for_tests};
    use rstest::rstest;
    use traildb_core::{ElementId, Timestamp};

    fn day(raw: &str) -> Timestamp {
        raw.parse().expect("valid timestamp")
    }

    fn rate_limited() -> TransportError {
        TransportError::RateLimited {
            url: "https://overpass.test/api/interpreter".to_owned(),
            status: 429,
        }
    }

    fn relation_query() -> OverpassQuery {
        OverpassQuery::relation_snapshot(ElementId::relation(9), None)
    }

    #[rstest]
    fn rate_limits_are_retried_until_success() {
        let stub = StubOverpass::new(day("2024-02-01"));
        stub.push_failure(rate_limited());
        stub.push_failure(rate_limited());
        let overpass = Overpass::new(stub, Throttle::immediate());

        let response = block_on_for_tests(overpass.query(&relation_query())).expect("eventual success");

        assert_eq!(response.base_timestamp, Some(day("2024-02-01")));
        assert_eq!(overpass.requests_issued(), 3);
    }

    #[rstest]
    fn retry_budget_is_bounded() {
        let stub = StubOverpass::new(day("2024-02-01"));
        for _ in 0..5 {
            stub.push_failure(rate_limited());
        }
        let overpass = Overpass::new(stub, Throttle::immediate().with_max_retries(2));

        let err = block_on_for_tests(overpass.query(&relation_query())).expect_err("budget exhausted");

        assert!(
            matches!(err, OverpassError::RetriesExhausted { attempts: 3, .. }),
            "unexpected error: {err}"
        );
        assert_eq!(overpass.requests_issued(), 3);
    }

    #[rstest]
    fn other_transport_errors_are_not_retried() {
        let stub = StubOverpass::new(day("2024-02-01"));
        stub.push_failure(TransportError::Http {
            url: "https://overpass.test/api/interpreter".to_owned(),
            status: 400,
            message: "bad query".to_owned(),
        });
        let overpass = Overpass::new(stub, Throttle::immediate());

        let err = block_on_for_tests(overpass.query(&relation_query())).expect_err("bad request");

        assert!(matches!(err, OverpassError::Transport { .. }), "unexpected error: {err}");
        assert_eq!(overpass.requests_issued(), 1);
    }

    #[rstest]
    fn stale_data_is_requeried_until_fresh() {
        let stub = StubOverpass::new(day("2024-02-02"));
        stub.queue_base(day("2024-01-31"));
        let overpass = Overpass::new(stub, Throttle::immediate());

        let response = block_on_for_tests(overpass.query_fresh(&relation_query(), day("2024-02-01")))
            .expect("fresh response");

        assert_eq!(response.base_timestamp, Some(day("2024-02-02")));
        assert_eq!(overpass.requests_issued(), 2);
    }

    #[rstest]
    fn stale_data_gives_up_after_the_budget() {
        let stub = StubOverpass::new(day("2024-01-31"));
        let overpass = Overpass::new(stub, Throttle::immediate().with_max_retries(1));

        let err = block_on_for_tests(overpass.query_fresh(&relation_query(), day("2024-02-01")))
            .expect_err("data never catches up");

        assert!(matches!(err, OverpassError::StaleData { attempts: 2, .. }), "unexpected error: {err}");
    }
}
