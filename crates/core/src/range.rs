//! Dashboard time ranges and histogram granularity.

use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Time-range selector accepted by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        Self::FifteenMinutes,
        Self::OneHour,
        Self::OneDay,
        Self::SevenDays,
        Self::ThirtyDays,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::OneDay => "24h",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
        }
    }

    /// Width of the window ending now.
    pub fn width(&self) -> Duration {
        match self {
            Self::FifteenMinutes => Duration::minutes(15),
            Self::OneHour => Duration::hours(1),
            Self::OneDay => Duration::hours(24),
            Self::SevenDays => Duration::days(7),
            Self::ThirtyDays => Duration::days(30),
        }
    }

    /// Earliest timestamp included in the window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.width()
    }

    pub fn granularity(&self) -> Granularity {
        match self {
            Self::FifteenMinutes | Self::OneHour => Granularity::Minute,
            Self::OneDay => Granularity::Hour,
            Self::SevenDays | Self::ThirtyDays => Granularity::Day,
        }
    }
}

impl FromStr for TimeRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| {
                Error::validation(format!(
                    "range '{}' must be one of 15m, 1h, 24h, 7d, 30d",
                    s
                ))
            })
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Histogram bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Minute,
    Hour,
    Day,
}

impl Granularity {
    /// Truncates `ts` to the start of its bucket, in the given offset.
    pub fn bucket_start(&self, ts: DateTime<Utc>, offset: FixedOffset) -> DateTime<FixedOffset> {
        let local = ts.with_timezone(&offset);
        let truncated = match self {
            Self::Minute => local.with_second(0).and_then(|t| t.with_nanosecond(0)),
            Self::Hour => local
                .with_minute(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0)),
            Self::Day => local
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .and_then(|midnight| offset.from_local_datetime(&midnight).single()),
        };
        // Fixed offsets have no gaps, so truncation always lands on a valid instant
        truncated.unwrap_or(local)
    }

    /// Stable label for a bucket start. Never depends on the host locale.
    pub fn label(&self, bucket_start: DateTime<FixedOffset>) -> String {
        match self {
            Self::Minute => bucket_start.format("%H:%M").to_string(),
            Self::Hour => bucket_start.format("%H:00").to_string(),
            Self::Day => bucket_start.format("%Y-%m-%d").to_string(),
        }
    }
}
