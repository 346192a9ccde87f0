use crate::config::Config;
use crate::error::{FetchError, RecordParseError};
use crate::fetch::windows::{split_range, SubWindow};
use crate::model::{DateRange, DisplayZone, SensorReading, SensorSeries};
use crate::monnit::models::{parse_wrapped_epoch_millis, ChartMessage};
use crate::monnit::MonnitClient;

/// What to do when one sub-window request fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort the fetch and discard everything gathered so far.
    #[default]
    FailFast,
    /// Record the failed window and keep fetching the others.
    BestEffort,
}

impl FailurePolicy {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" | "failfast" => Some(Self::FailFast),
            "best-effort" | "besteffort" | "partial" => Some(Self::BestEffort),
            _ => None,
        }
    }
}

/// A sub-window that was skipped under [`FailurePolicy::BestEffort`].
#[derive(Debug, Clone)]
pub struct WindowFailure {
    pub window: SubWindow,
    pub error: String,
}

/// Outcome of a completed fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    /// Merged readings in arrival order
    pub series: SensorSeries,
    /// Records dropped because their Date or Value could not be used
    pub skipped_records: usize,
    /// Sub-windows that answered with a usable response
    pub windows_fetched: usize,
    pub failed_windows: Vec<WindowFailure>,
}

/// Turn one raw Monnit record into a reading.
///
/// # Errors
///
/// Returns the reason the record is unusable; the caller skips it.
pub fn normalize_record(
    raw: serde_json::Value,
    zone: DisplayZone,
) -> Result<SensorReading, RecordParseError> {
    let message: ChartMessage = serde_json::from_value(raw)?;

    let date = message.date.ok_or(RecordParseError::MissingDate)?;
    let millis = parse_wrapped_epoch_millis(&date)?;
    let timestamp = zone
        .from_epoch_millis(millis)
        .ok_or(RecordParseError::TimestampOutOfRange(millis))?;

    let value = message.value.ok_or(RecordParseError::MissingValue)?.as_f64()?;

    Ok(SensorReading::new(timestamp, value))
}

/// Fetches a sensor's history window by window and merges it into one series.
pub struct SensorFetcher {
    client: MonnitClient,
    sub_windows: u32,
    policy: FailurePolicy,
    zone: DisplayZone,
}

impl SensorFetcher {
    #[must_use]
    pub fn new(client: MonnitClient) -> Self {
        Self {
            client,
            sub_windows: crate::config::DEFAULT_SUB_WINDOWS,
            policy: FailurePolicy::default(),
            zone: DisplayZone::default(),
        }
    }

    #[must_use]
    pub fn from_config(client: MonnitClient, config: &Config) -> Self {
        Self::new(client)
            .with_sub_windows(config.fetch_sub_windows)
            .with_policy(config.fetch_failure_policy)
            .with_zone(config.display_zone)
    }

    #[must_use]
    pub fn with_sub_windows(mut self, count: u32) -> Self {
        self.sub_windows = count.max(1);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Fetch and merge, collapsing any fetch-level failure to an empty series.
    ///
    /// The failure is logged; callers only see "no data".
    pub async fn fetch(&self, range: &DateRange, sensor_id: &str) -> SensorSeries {
        match self.try_fetch(range, sensor_id).await {
            Ok(report) => report.series,
            Err(e) => {
                tracing::error!(sensor_id, error = %e, "Fetch aborted, returning no data");
                SensorSeries::default()
            }
        }
    }

    /// Fetch every sub-window of `range` in order.
    ///
    /// # Errors
    ///
    /// Under [`FailurePolicy::FailFast`], returns the first sub-window error; no
    /// later window is requested and earlier data is dropped. Under
    /// [`FailurePolicy::BestEffort`] this never fails.
    pub async fn try_fetch(
        &self,
        range: &DateRange,
        sensor_id: &str,
    ) -> Result<FetchReport, FetchError> {
        let windows = split_range(range, self.sub_windows);
        let mut report = FetchReport::default();

        tracing::info!(
            sensor_id,
            from = %range.start(),
            to = %range.end(),
            windows = windows.len(),
            "Fetching sensor history"
        );

        for window in &windows {
            let response = match self.client.sensor_chart_messages(sensor_id, window).await {
                Ok(r) => r,
                Err(e) => match self.policy {
                    FailurePolicy::FailFast => {
                        tracing::warn!(
                            sensor_id,
                            window = window.index,
                            discarded = report.series.len(),
                            error = %e,
                            "Sub-window failed, aborting fetch"
                        );
                        return Err(e);
                    }
                    FailurePolicy::BestEffort => {
                        tracing::warn!(
                            sensor_id,
                            window = window.index,
                            error = %e,
                            "Sub-window failed, continuing"
                        );
                        report.failed_windows.push(WindowFailure {
                            window: *window,
                            error: e.to_string(),
                        });
                        continue;
                    }
                },
            };

            report.windows_fetched += 1;
            let received = response.result.len();

            for raw in response.result {
                match normalize_record(raw, self.zone) {
                    Ok(reading) => report.series.push(reading),
                    Err(e) => {
                        report.skipped_records += 1;
                        tracing::warn!(
                            sensor_id,
                            window = window.index,
                            error = %e,
                            "Skipping unusable record"
                        );
                    }
                }
            }

            tracing::debug!(sensor_id, window = window.index, received, "Sub-window fetched");
        }

        tracing::info!(
            sensor_id,
            readings = report.series.len(),
            skipped = report.skipped_records,
            failed_windows = report.failed_windows.len(),
            "Fetch complete"
        );

        Ok(report)
    }
}
