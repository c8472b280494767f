//! Conflict resolution between two differing non-empty values.
//!
//! Only timestamps are ever reconciled automatically. Two timestamps are the
//! same capture instant when they are identical, when they differ by exactly
//! the devices' local UTC offset (one namespace written in local time, the
//! other in UTC), or when they share a date and the earlier one sits at
//! midnight (a date-only capture that lost its time of day).

use chrono::{Duration, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::domain::TagValue;

pub const ZERO_TIME: &str = "0000:00:00 00:00:00";
pub const TIMESTAMP_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

static TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}:\d{2}:\d{2} \d{2}:\d{2}:\d{2}(\.\d+)?$").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("conflicting values: {0} / {1}")]
    Value(String, String),
    #[error("conflicting timestamps: {0} / {1}")]
    Time(String, String),
}

impl ConflictError {
    pub fn is_time(&self) -> bool {
        matches!(self, ConflictError::Time(..))
    }
}

/// How a transfer settled a disagreement between source and destination.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictOutcome {
    ResolvedTimeEquivalent(TagValue),
    KeepDestination,
    KeepSource,
    Unresolved,
}

#[derive(Debug, Clone)]
pub struct ConflictResolver {
    offset_suffix: String,
    offset_hours: i32,
}

impl ConflictResolver {
    pub fn new(offset_hours: i32) -> Self {
        let sign = if offset_hours < 0 { '-' } else { '+' };
        Self { offset_suffix: format!("{}{:02}:00", sign, offset_hours.abs()), offset_hours }
    }

    pub fn offset_suffix(&self) -> &str {
        &self.offset_suffix
    }

    /// Pick the canonical value of two equivalent timestamps.
    ///
    /// The result does not depend on argument order.
    pub fn resolve(&self, src: &str, dst: &str) -> Result<String, ConflictError> {
        let a = self.strip_offset(src);
        let b = self.strip_offset(dst);
        let (t1, t2) = if a <= b { (a, b) } else { (b, a) };

        if !TIMESTAMP_RE.is_match(t1) || !TIMESTAMP_RE.is_match(t2) {
            return Err(ConflictError::Value(src.to_string(), dst.to_string()));
        }
        if t1 == ZERO_TIME {
            return Ok(t2.to_string());
        }
        if t2 == ZERO_TIME {
            return Ok(t1.to_string());
        }

        let (Some(early), Some(late)) = (parse_timestamp(t1), parse_timestamp(t2)) else {
            return Err(ConflictError::Time(src.to_string(), dst.to_string()));
        };
        let delta = late - early;
        let offset = Duration::hours(i64::from(self.offset_hours.abs()));

        if delta == Duration::zero()
            || (early.date() == late.date() && early.time() == NaiveTime::MIN)
        {
            return Ok(late.format(TIMESTAMP_FORMAT).to_string());
        }
        if offset != Duration::zero() && delta == offset {
            // The local reading wins. East of UTC it is the later one, west of
            // UTC the earlier; taking the later there would keep the UTC value.
            let local = if self.offset_hours >= 0 { late } else { early };
            return Ok(local.format(TIMESTAMP_FORMAT).to_string());
        }
        Err(ConflictError::Time(src.to_string(), dst.to_string()))
    }

    fn strip_offset<'a>(&self, value: &'a str) -> &'a str {
        value.trim().strip_suffix(self.offset_suffix.as_str()).unwrap_or(value.trim())
    }
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y:%m:%d %H:%M:%S%.f").ok()
}
