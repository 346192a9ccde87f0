use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::Response,
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::model::{format_timestamp, DateRange};
use crate::routes::pages::render_chart;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReadingsQuery {
    /// First day (`YYYY-MM-DD`), from midnight
    pub from_date: String,
    /// Last day (`YYYY-MM-DD`), up to midnight
    pub to_date: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingsResponse {
    pub sensor_id: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Readings sorted by timestamp
    pub readings: Vec<ReadingPoint>,
    /// Records dropped because their Date or Value was unusable
    pub skipped_records: usize,
    /// Indexes of sub-windows that failed (best-effort policy only)
    pub failed_windows: Vec<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingPoint {
    /// `YYYY-MM-DD HH:MM:SS` in the display time zone
    pub timestamp: String,
    pub value: f64,
}

/// Get readings for a sensor
///
/// Fetches the sensor's history from Monnit in sub-windows and returns the
/// merged, sorted series. Unlike the HTML page, upstream failures are reported.
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/readings",
    params(
        ("sensor_id" = String, Path, description = "Monnit sensor ID"),
        ReadingsQuery
    ),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = ReadingsResponse),
        (status = 400, description = "Invalid date range"),
        (status = 502, description = "Monnit API request failed"),
    ),
    tag = "readings"
)]
pub async fn get_sensor_readings(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> AppResult<Json<ReadingsResponse>> {
    let range = DateRange::from_dates(&query.from_date, &query.to_date)?;

    let mut report = state.fetcher.try_fetch(&range, &sensor_id).await?;
    report.series.sort();

    let readings = report
        .series
        .readings()
        .iter()
        .map(|r| ReadingPoint {
            timestamp: format_timestamp(r.timestamp),
            value: r.value,
        })
        .collect();

    Ok(Json(ReadingsResponse {
        sensor_id,
        start: range.start(),
        end: range.end(),
        readings,
        skipped_records: report.skipped_records,
        failed_windows: report.failed_windows.iter().map(|f| f.window.index).collect(),
    }))
}

/// Get a sensor chart image
///
/// Returns the chart as a PNG image. Upstream failures produce an empty chart.
#[utoipa::path(
    get,
    path = "/api/sensors/{sensor_id}/chart",
    params(
        ("sensor_id" = String, Path, description = "Monnit sensor ID"),
        ReadingsQuery
    ),
    responses(
        (status = 200, description = "Chart image", body = Vec<u8>, content_type = "image/png"),
        (status = 400, description = "Invalid date range"),
    ),
    tag = "readings"
)]
pub async fn get_sensor_chart(
    State(state): State<AppState>,
    Path(sensor_id): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> AppResult<Response> {
    let range = DateRange::from_dates(&query.from_date, &query.to_date)?;

    let mut series = state.fetcher.fetch(&range, &sensor_id).await;
    series.sort();

    let artifact = render_chart(Arc::clone(&state.renderer), series, range).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static(artifact.mime()))
        .header("X-Chart-Points", HeaderValue::from(artifact.points()))
        .body(axum::body::Body::from(artifact.bytes().to_vec()))
        .map_err(|e| AppError::Internal(e.to_string()))
}
