//! Translation of user-facing expiration requests into absolute deadlines.

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use thiserror::Error;

/// An expiration string that is neither a known keyword nor a timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid expiration '{0}': expected never, 1h, 1d, 1w, 1m, YYYY-MM-DD, an ISO 8601 timestamp or epoch milliseconds")]
pub struct InvalidExpiration(pub String);

/// Fixed offsets a paste may expire after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeExpiry {
    Hour,
    Day,
    Week,
    /// Thirty days.
    Month,
}

impl RelativeExpiry {
    pub fn offset(self) -> Duration {
        match self {
            RelativeExpiry::Hour => Duration::hours(1),
            RelativeExpiry::Day => Duration::days(1),
            RelativeExpiry::Week => Duration::weeks(1),
            RelativeExpiry::Month => Duration::days(30),
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "1h" => Some(RelativeExpiry::Hour),
            "1d" => Some(RelativeExpiry::Day),
            "1w" => Some(RelativeExpiry::Week),
            "1m" => Some(RelativeExpiry::Month),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationRequest {
    Never,
    Relative(RelativeExpiry),
    Absolute(DateTime<Utc>),
}

impl ExpirationRequest {
    /// Parse the textual form accepted by the API and the CLI.
    pub fn parse(input: &str) -> Result<Self, InvalidExpiration> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("never") {
            return Ok(ExpirationRequest::Never);
        }
        if let Some(relative) = RelativeExpiry::from_token(trimmed) {
            return Ok(ExpirationRequest::Relative(relative));
        }
        parse_timestamp(trimmed)
            .map(ExpirationRequest::Absolute)
            .ok_or_else(|| InvalidExpiration(input.to_owned()))
    }

    /// An absolute deadline given as milliseconds since the Unix epoch.
    pub fn from_epoch_millis(millis: i64) -> Result<Self, InvalidExpiration> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(ExpirationRequest::Absolute)
            .ok_or_else(|| InvalidExpiration(millis.to_string()))
    }

    /// Resolve against a single read of the wall clock.
    pub fn resolve(self) -> Option<DateTime<Utc>> {
        self.resolve_at(Utc::now())
    }

    /// Resolve against the given instant.
    ///
    /// Past absolute deadlines are returned as-is; liveness is decided when
    /// the paste is read or swept.
    pub fn resolve_at(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let deadline = match self {
            ExpirationRequest::Never => return None,
            ExpirationRequest::Relative(relative) => now + relative.offset(),
            ExpirationRequest::Absolute(deadline) => deadline,
        };
        Some(deadline.trunc_subsecs(3))
    }
}

impl FromStr for ExpirationRequest {
    type Err = InvalidExpiration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExpirationRequest::parse(s)
    }
}

fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(input) {
        return Some(timestamp.with_timezone(&Utc));
    }

    // timestamps without an offset are taken as UTC
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
