use serde::Deserialize;

use crate::error::RecordParseError;

/// Prefix of the vendor's wrapped timestamp, e.g. `/Date(1704067200000)/`.
pub const DATE_PREFIX: &str = "/Date(";
/// Suffix of the vendor's wrapped timestamp.
pub const DATE_SUFFIX: &str = ")/";

/// Response from `/json/SensorChartMessages`.
///
/// Records are kept as raw JSON so one bad record can be skipped without
/// rejecting the whole page.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartMessagesResponse {
    #[serde(rename = "Result")]
    pub result: Vec<serde_json::Value>,
}

/// One sensor message as returned by Monnit.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartMessage {
    /// Wrapped epoch timestamp, see [`parse_wrapped_epoch_millis`]
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    /// Reading; Monnit sends numbers, older accounts send numeric strings
    #[serde(rename = "Value", default)]
    pub value: Option<MessageValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageValue {
    Number(f64),
    Text(String),
}

impl MessageValue {
    /// # Errors
    ///
    /// Returns `RecordParseError::InvalidValue` for text that is not a finite number.
    pub fn as_f64(&self) -> Result<f64, RecordParseError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| RecordParseError::InvalidValue(s.clone())),
        }
    }
}

/// Extract the millisecond epoch from a Monnit `Date` string.
///
/// The format is exactly `/Date(<millis>)/`: the 6-character prefix `/Date(`,
/// a signed decimal integer of milliseconds since the Unix epoch, and the
/// 2-character suffix `)/`. Anything else, including a time zone offset inside
/// the parentheses, is rejected.
///
/// # Errors
///
/// Returns `RecordParseError::DateWrapper` if the wrapper or the number is malformed.
pub fn parse_wrapped_epoch_millis(raw: &str) -> Result<i64, RecordParseError> {
    raw.strip_prefix(DATE_PREFIX)
        .and_then(|rest| rest.strip_suffix(DATE_SUFFIX))
        .filter(|digits| !digits.starts_with('+'))
        .and_then(|digits| digits.parse::<i64>().ok())
        .ok_or_else(|| RecordParseError::DateWrapper(raw.to_string()))
}
