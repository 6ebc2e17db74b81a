//! Metrics collection.
//!
//! # Responsibilities
//! - Define server metrics (requests, latency, throttling, in-flight work)
//! - Record them through the `metrics` facade; the embedding application
//!   installs whatever recorder/exporter it wants
//!
//! # Metrics
//! - `hearth_requests_total` (counter): requests by method, status
//! - `hearth_request_duration_seconds` (histogram): pipeline latency by method
//! - `hearth_rate_limited_total` (counter): rejected requests by key kind
//! - `hearth_in_flight_requests` (gauge): requests accepted but not yet flushed
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op

use std::time::Duration;

use http::StatusCode;

use crate::http::Method;

pub const REQUESTS_TOTAL: &str = "hearth_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "hearth_request_duration_seconds";
pub const RATE_LIMITED_TOTAL: &str = "hearth_rate_limited_total";
pub const IN_FLIGHT_REQUESTS: &str = "hearth_in_flight_requests";

pub fn record_request(method: Method, status: StatusCode, elapsed: Duration) {
    ::metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.as_str(),
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    ::metrics::histogram!(REQUEST_DURATION_SECONDS, "method" => method.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_rate_limited(key_kind: &'static str) {
    ::metrics::counter!(RATE_LIMITED_TOTAL, "key_kind" => key_kind).increment(1);
}

pub fn request_started() {
    ::metrics::gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
}

pub fn request_finished() {
    ::metrics::gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
}
