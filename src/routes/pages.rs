use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form,
};
use chrono::{Days, Local};
use serde::Deserialize;

use crate::chart::{ChartArtifact, ChartRenderer};
use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::model::{DateRange, SensorSeries, DATE_FORMAT};

const NO_DATA_NOTICE: &str = "No readings were returned for this sensor and date range.";

#[derive(Debug, Default, Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub chart_html: String,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub from_date: String,
    pub to_date: String,
    pub sensor: String,
}

impl IndexTemplate {
    fn from_form(form: &ChartForm) -> Self {
        Self {
            from_date: form.from_date.clone(),
            to_date: form.to_date.clone(),
            sensor: form.sensor.clone(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Template)]
#[template(path = "select_date.html")]
pub struct SelectDateTemplate {
    pub from_date: String,
    pub to_date: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartForm {
    pub from_date: String,
    pub to_date: String,
    pub sensor: String,
}

/// Index page with an empty chart area.
pub async fn index() -> AppResult<Html<String>> {
    Ok(Html(IndexTemplate::default().render()?))
}

/// Date picker defaulting to the last day.
pub async fn select_date() -> AppResult<Html<String>> {
    let today = Local::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let page = SelectDateTemplate {
        from_date: yesterday.format(DATE_FORMAT).to_string(),
        to_date: today.format(DATE_FORMAT).to_string(),
    };
    Ok(Html(page.render()?))
}

/// Fetch the submitted sensor's readings and show them as a chart.
///
/// Fetch failures are logged and shown as an empty chart; only an invalid
/// date range is reported back as an error.
pub async fn show_chart(
    State(state): State<AppState>,
    Form(form): Form<ChartForm>,
) -> AppResult<Response> {
    let range = match DateRange::from_dates(&form.from_date, &form.to_date) {
        Ok(range) => range,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected chart request");
            let page = IndexTemplate {
                error: Some(e.to_string()),
                ..IndexTemplate::from_form(&form)
            };
            return Ok((StatusCode::BAD_REQUEST, Html(page.render()?)).into_response());
        }
    };

    let mut series = state.fetcher.fetch(&range, &form.sensor).await;
    series.sort();

    let artifact = render_chart(Arc::clone(&state.renderer), series, range).await?;
    let page = IndexTemplate {
        notice: artifact.is_placeholder().then(|| NO_DATA_NOTICE.to_string()),
        chart_html: artifact.img_tag(),
        ..IndexTemplate::from_form(&form)
    };

    Ok(Html(page.render()?).into_response())
}

/// Draw a sorted series on the blocking pool.
///
/// # Errors
///
/// Returns `AppError::Render` if drawing fails and `AppError::Internal` if the
/// blocking task panics.
pub async fn render_chart(
    renderer: Arc<ChartRenderer>,
    series: SensorSeries,
    range: DateRange,
) -> AppResult<ChartArtifact> {
    let artifact = tokio::task::spawn_blocking(move || {
        let (timestamps, values) = series.into_columns();
        renderer.render(&timestamps, &values, range.start(), range.end())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Chart task failed: {e}")))??;

    Ok(artifact)
}
