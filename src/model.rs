//! Core value types shared by the fetcher and the chart renderer.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::RangeError;

/// Wire and display format for timestamps at second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the calendar dates submitted by the chart form.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a timestamp the way the Monnit API and the chart labels expect it.
#[must_use]
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp.
///
/// # Errors
///
/// Returns the chrono parse error if the string does not match the format.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT)
}

/// Time zone used to turn vendor epoch timestamps into wall-clock readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// The zone of the running process.
    #[default]
    Local,
    Named(Tz),
}

impl DisplayZone {
    /// Convert milliseconds since the Unix epoch to a wall-clock timestamp in
    /// this zone, truncated to whole seconds.
    ///
    /// Returns `None` when the instant is outside chrono's representable range.
    #[must_use]
    pub fn from_epoch_millis(self, millis: i64) -> Option<NaiveDateTime> {
        let seconds = millis.div_euclid(1000);
        let instant = DateTime::<Utc>::from_timestamp(seconds, 0)?;
        Some(match self {
            Self::Local => instant.with_timezone(&Local).naive_local(),
            Self::Named(tz) => instant.with_timezone(&tz).naive_local(),
        })
    }
}

/// Requested chart window. `end` is always strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns `RangeError::Inverted` if `end` is not after `start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, RangeError> {
        if end <= start {
            return Err(RangeError::Inverted {
                start: format_timestamp(start),
                end: format_timestamp(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Build a range from two `YYYY-MM-DD` dates, each anchored at midnight.
    ///
    /// # Errors
    ///
    /// Returns `RangeError::InvalidDate` for an unparseable date and
    /// `RangeError::Inverted` if `to` is not after `from`.
    pub fn from_dates(from: &str, to: &str) -> Result<Self, RangeError> {
        Self::new(parse_midnight(from)?, parse_midnight(to)?)
    }

    #[must_use]
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

fn parse_midnight(raw: &str) -> Result<NaiveDateTime, RangeError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
        .map_err(|e| RangeError::InvalidDate {
            input: raw.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

impl SensorReading {
    #[must_use]
    pub fn new(timestamp: NaiveDateTime, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Readings merged from every sub-window of a fetch.
///
/// Order is whatever the fetch produced until [`SensorSeries::sort`] is called.
/// Duplicate timestamps are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SensorSeries {
    readings: Vec<SensorReading>,
}

impl SensorSeries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reading: SensorReading) {
        self.readings.push(reading);
    }

    /// Sort ascending by timestamp, breaking ties by value.
    pub fn sort(&mut self) {
        self.readings.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.value.total_cmp(&b.value))
        });
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.readings
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[must_use]
    pub fn readings(&self) -> &[SensorReading] {
        &self.readings
    }

    /// Split into co-indexed timestamp strings and values, the shape the
    /// renderer consumes.
    #[must_use]
    pub fn into_columns(self) -> (Vec<String>, Vec<f64>) {
        self.readings
            .into_iter()
            .map(|r| (format_timestamp(r.timestamp), r.value))
            .unzip()
    }
}

impl Extend<SensorReading> for SensorSeries {
    fn extend<I: IntoIterator<Item = SensorReading>>(&mut self, iter: I) {
        self.readings.extend(iter);
    }
}

impl FromIterator<SensorReading> for SensorSeries {
    fn from_iter<I: IntoIterator<Item = SensorReading>>(iter: I) -> Self {
        Self {
            readings: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for SensorSeries {
    type Item = SensorReading;
    type IntoIter = std::vec::IntoIter<SensorReading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.into_iter()
    }
}
