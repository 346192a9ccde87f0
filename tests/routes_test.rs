//! Router tests driving the HTML and JSON endpoints in-process.
//!
//! Run with: cargo test --test routes_test

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use tower::ServiceExt;

use sensor_chart::chart::ChartRenderer;
use sensor_chart::common::AppState;
use sensor_chart::config::{Config, Credentials};
use sensor_chart::fetch::SensorFetcher;
use sensor_chart::model::DisplayZone;
use sensor_chart::monnit::MonnitClient;
use sensor_chart::routes::build_router;

const PATH: &str = "/json/SensorChartMessages";

fn app(server: &ServerGuard) -> Router {
    let config = Config {
        monnit_url: format!("{}{PATH}", server.url()),
        credentials: Credentials::new("id", "secret"),
        display_zone: DisplayZone::Named(chrono_tz::UTC),
        ..Config::default()
    };
    let client = MonnitClient::from_config(&config).unwrap();
    let fetcher = SensorFetcher::from_config(client, &config);
    let renderer = ChartRenderer::from_config(&config);
    build_router(AppState::new(config, fetcher, renderer))
}

/// Every window answers with the same single reading at 2024-01-01 06:00:00 UTC.
async fn mock_readings(server: &mut ServerGuard, sensor: &str) -> mockito::Mock {
    server
        .mock("POST", PATH)
        .match_body(Matcher::UrlEncoded("sensorID".into(), sensor.into()))
        .with_status(200)
        .with_body(
            json!({"Result": [{"Date": "/Date(1704088800000)/", "Value": 71.5}]}).to_string(),
        )
        .expect(5)
        .create_async()
        .await
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn chart_form(body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let server = Server::new_async().await;
    let response = app(&server)
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn index_shows_the_form() {
    let server = Server::new_async().await;
    let response = app(&server)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("<form"));
    assert!(html.contains("name=\"sensor\""));
    assert!(!html.contains("<img"));
}

#[tokio::test]
async fn select_date_prefills_dates() {
    let server = Server::new_async().await;
    let response = app(&server)
        .oneshot(Request::get("/select_date").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("name=\"from_date\""));
    assert!(html.contains("name=\"to_date\""));
}

#[tokio::test]
async fn posting_the_form_embeds_a_chart() {
    let mut server = Server::new_async().await;
    let mock = mock_readings(&mut server, "42").await;

    let response = app(&server)
        .oneshot(chart_form("from_date=2024-01-01&to_date=2024-01-02&sensor=42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("<img src=\"data:image/png;base64,iVBORw0KGgo"));
    assert!(!html.contains("No readings were returned"));
    mock.assert_async().await;
}

#[tokio::test]
async fn upstream_failure_still_renders_an_empty_chart() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let response = app(&server)
        .oneshot(chart_form("from_date=2024-01-01&to_date=2024-01-02&sensor=42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("data:image/png;base64,"));
    assert!(html.contains("No readings were returned"));
    mock.assert_async().await;
}

#[tokio::test]
async fn inverted_range_is_a_bad_request() {
    let server = Server::new_async().await;
    let response = app(&server)
        .oneshot(chart_form("from_date=2024-01-05&to_date=2024-01-01&sensor=42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let html = body_string(response).await;
    assert!(html.contains("value=\"2024-01-05\""));
}

#[tokio::test]
async fn unparseable_date_is_a_bad_request() {
    let server = Server::new_async().await;
    let response = app(&server)
        .oneshot(chart_form("from_date=01/01/2024&to_date=2024-01-02&sensor=42"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn readings_endpoint_returns_sorted_json() {
    let mut server = Server::new_async().await;
    let mock = mock_readings(&mut server, "9001").await;

    let response = app(&server)
        .oneshot(
            Request::get("/api/sensors/9001/readings?from_date=2024-01-01&to_date=2024-01-02")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["sensor_id"], "9001");
    assert_eq!(body["skipped_records"], 0);
    let readings = body["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 5);
    assert_eq!(readings[0]["timestamp"], "2024-01-01 06:00:00");
    assert_eq!(readings[0]["value"], 71.5);
    mock.assert_async().await;
}

#[tokio::test]
async fn readings_endpoint_reports_upstream_failure() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(r#"{"Method":"SensorChartMessages"}"#)
        .create_async()
        .await;

    let response = app(&server)
        .oneshot(
            Request::get("/api/sensors/42/readings?from_date=2024-01-01&to_date=2024-01-02")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn chart_endpoint_serves_png() {
    let mut server = Server::new_async().await;
    let _mock = mock_readings(&mut server, "42").await;

    let response = app(&server)
        .oneshot(
            Request::get("/api/sensors/42/chart?from_date=2024-01-01&to_date=2024-01-02")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "image/png"
    );
    assert_eq!(response.headers()["X-Chart-Points"], "5");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
}
