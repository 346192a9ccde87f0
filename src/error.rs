use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Invalid chart window supplied by the caller.
#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    #[error("Invalid date '{input}': {reason}")]
    InvalidDate { input: String, reason: String },

    #[error("End date {end} must be after start date {start}")]
    Inverted { start: String, end: String },
}

/// Failure of a whole sub-window request. Depending on the failure policy this
/// aborts the fetch or is recorded and skipped.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request for sub-window {window} failed: {source}")]
    Network {
        window: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("Sub-window {window} returned HTTP {status}: {body}")]
    Http {
        window: usize,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Sub-window {window} returned a malformed response: {reason}")]
    MalformedResponse { window: usize, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A single unusable record. Never fatal: the record is logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum RecordParseError {
    #[error("record is not a Date/Value object: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("record has no Date")]
    MissingDate,

    #[error("Date '{0}' is not a /Date(<millis>)/ timestamp")]
    DateWrapper(String),

    #[error("timestamp {0} ms is out of range")]
    TimestampOutOfRange(i64),

    #[error("record has no Value")]
    MissingValue,

    #[error("Value '{0}' is not a number")]
    InvalidValue(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{timestamps} timestamps but {values} values")]
    LengthMismatch { timestamps: usize, values: usize },

    #[error("Invalid timestamp '{input}': {source}")]
    Timestamp {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Axis start {start} must be before end {end}")]
    EmptyAxis { start: String, end: String },

    #[error("Drawing failed: {0}")]
    Drawing(String),

    #[error("PNG encoding failed: {0}")]
    Rasterize(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    InvalidRange(#[from] RangeError),

    #[error("Monnit API error: {0}")]
    Upstream(#[from] FetchError),

    #[error("Chart error: {0}")]
    Render(#[from] RenderError),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            Self::InvalidRange(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Upstream(e) => {
                tracing::error!("Monnit API error: {e}");
                (StatusCode::BAD_GATEWAY, format!("Monnit API error: {e}"))
            }
            Self::Render(e) => {
                tracing::error!("Chart error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Chart rendering failed".to_string(),
                )
            }
            Self::Template(e) => {
                tracing::error!("Template error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Template error".to_string(),
                )
            }
            Self::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
