//! Inclusive modification-date filtering.
//!
//! Wire dates are `YYYY-MM-DD` strings. A bound covers its whole day in local
//! time: the start bound begins at 00:00:00 and the end bound runs through
//! 23:59:59, so `end_date = 2024-06-15` still matches a file touched that
//! evening.

use chrono::{Local, NaiveDate, TimeZone};

use crate::error::{Result, ScoutError};

/// A parsed, inclusive modified-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Start of the first day, Unix seconds.
    start: Option<i64>,
    /// End of the last day, Unix seconds.
    end: Option<i64>,
}

impl DateRange {
    /// Parses optional wire bounds into a range.
    ///
    /// Returns `Ok(None)` when neither bound is supplied. Malformed dates and
    /// reversed bounds are rejected here, before any filesystem work starts.
    pub fn parse(start_date: Option<&str>, end_date: Option<&str>) -> Result<Option<Self>> {
        let start = start_date.map(parse_wire_date).transpose()?;
        let end = end_date.map(parse_wire_date).transpose()?;

        if let (Some(first), Some(last)) = (start, end) {
            if first > last {
                return Err(ScoutError::InvalidInput(
                    "start_date must be before or equal to end_date".to_string(),
                ));
            }
        }

        if start.is_none() && end.is_none() {
            return Ok(None);
        }

        Ok(Some(Self {
            start: start.map(day_start),
            end: end.map(day_end),
        }))
    }

    /// Checks if a modification timestamp (Unix seconds) falls in the range.
    pub fn matches(&self, timestamp: i64) -> bool {
        if let Some(bound) = self.start {
            if timestamp < bound {
                return false;
            }
        }
        if let Some(bound) = self.end {
            if timestamp > bound {
                return false;
            }
        }
        true
    }
}

fn parse_wire_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ScoutError::InvalidInput(format!("unrecognized date value: {raw:?}")))
}

/// Unix timestamp for midnight at the start of a local-time day.
fn day_start(date: NaiveDate) -> i64 {
    let start = date.and_hms_opt(0, 0, 0).expect("valid time");
    Local
        .from_local_datetime(&start)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

/// Unix timestamp for 23:59:59 at the end of a local-time day.
fn day_end(date: NaiveDate) -> i64 {
    let end = date.and_hms_opt(23, 59, 59).expect("valid time");
    Local
        .from_local_datetime(&end)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or(i64::MAX)
}
