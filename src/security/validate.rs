use axum::http::HeaderMap;
use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, warn};

use crate::errors::Error;

/// Headers every authenticated request must carry, checked in this order so
/// rejection messages are reproducible.
pub const REQUIRED_HEADERS: [&str; 4] = ["authorization", "date", "digest", "host"];

/// Validate a request's parameters before trying to verify its signature.
/// Returns the parsed request date as epoch milliseconds.
pub fn validate(skew: i64, headers: &HeaderMap, identifier: &str) -> Result<i64, Error> {
    for name in REQUIRED_HEADERS {
        if !headers.contains_key(name) {
            return Err(Error::request(format!("Missing header {name}")));
        }
    }

    let raw = headers
        .get("date")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::request("Invalid Date header"))?;

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    let date = parse_date(raw, identifier, forwarded)?;

    check_skew(Utc::now().timestamp_millis(), date, skew)?;

    Ok(date)
}

/// Parse the Date header into epoch milliseconds.
///
/// Two client eras emitted different encodings: calendar date strings and
/// millisecond-precision epoch integers. Calendar strings are tried first
/// for backwards compatibility and logged as deprecated; the raw value is
/// then reinterpreted as a base-10 epoch-millisecond count.
pub fn parse_date(raw: &str, identifier: &str, forwarded_for: &str) -> Result<i64, Error> {
    if let Some(date) = parse_calendar(raw) {
        warn!(
            identifier = %identifier,
            ip = %forwarded_for,
            "Date string deprecation notice: use millisecond-precision epoch time instead"
        );

        return Ok(date.timestamp_millis());
    }

    raw.parse::<i64>()
        .map_err(|_| Error::request("Invalid Date header"))
}

fn parse_calendar(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(raw) {
        return Some(date);
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date);
    }

    // JS Date#toString form, e.g. "Thu Mar 24 2016 00:17:57 GMT-0400 (EDT)",
    // with the parenthesized zone name dropped
    let trimmed = raw.split(" (").next().unwrap_or(raw);
    DateTime::parse_from_str(trimmed, "%a %b %d %Y %H:%M:%S GMT%z").ok()
}

/// Bound the replay window: a captured request becomes unusable once its
/// date drifts more than `skew` milliseconds from the server clock.
pub(crate) fn check_skew(now: i64, date: i64, skew: i64) -> Result<(), Error> {
    debug!("Date skew {}ms", now - date);

    if (now - date).abs() > skew {
        return Err(Error::authorization("Request date skew is too large"));
    }

    Ok(())
}
