use chrono::{Duration, NaiveDateTime};

use crate::model::{format_timestamp, DateRange};

/// One partition of a requested range, fetched with a single API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubWindow {
    pub index: usize,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SubWindow {
    /// `fromDate` request field.
    #[must_use]
    pub fn from_param(&self) -> String {
        format_timestamp(self.start)
    }

    /// `toDate` request field.
    #[must_use]
    pub fn to_param(&self) -> String {
        format_timestamp(self.end)
    }
}

/// Split `range` into `count` equal sub-windows.
///
/// Boundaries fall on whole seconds measured from the range start. Each window
/// ends where the next begins, the first starts at `range.start()` and the last
/// ends at `range.end()`. A `count` of zero is treated as one.
#[must_use]
pub fn split_range(range: &DateRange, count: u32) -> Vec<SubWindow> {
    let count = i64::from(count.max(1));
    let start = range.start();
    let total_seconds = (range.end() - start).num_seconds();

    let boundary = |i: i64| {
        if i == count {
            range.end()
        } else {
            start + Duration::seconds(total_seconds * i / count)
        }
    };

    (0..count)
        .map(|i| SubWindow {
            index: usize::try_from(i).unwrap_or_default(),
            start: boundary(i),
            end: boundary(i + 1),
        })
        .collect()
}
