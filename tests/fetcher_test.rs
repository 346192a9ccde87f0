//! Integration tests for the sub-window fetcher against a mocked Monnit API.
//!
//! Run with: cargo test --test fetcher_test

use std::io;
use std::sync::{Arc, Mutex};

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;
use tracing_subscriber::fmt::MakeWriter;

use sensor_chart::config::Credentials;
use sensor_chart::error::FetchError;
use sensor_chart::fetch::{split_range, FailurePolicy, SensorFetcher, SubWindow};
use sensor_chart::model::{parse_timestamp, DateRange, DisplayZone};
use sensor_chart::monnit::MonnitClient;

const PATH: &str = "/json/SensorChartMessages";
const SENSOR: &str = "42";

/// Log output collected by a test-local subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines_containing(&self, needle: &str) -> usize {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(needle))
            .count()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn fetcher(server: &ServerGuard) -> SensorFetcher {
    let client = MonnitClient::new(
        format!("{}{PATH}", server.url()),
        Credentials::new("key-id", "key-secret"),
    )
    .unwrap();
    SensorFetcher::new(client).with_zone(DisplayZone::Named(chrono_tz::UTC))
}

fn one_day() -> DateRange {
    DateRange::from_dates("2024-01-01", "2024-01-02").unwrap()
}

fn record_at(window: &SubWindow, minutes: i64, value: f64) -> serde_json::Value {
    let millis = (window.start + chrono::Duration::minutes(minutes))
        .and_utc()
        .timestamp_millis();
    json!({"Date": format!("/Date({millis})/"), "Value": value})
}

async fn mock_window(server: &mut ServerGuard, window: &SubWindow, status: usize, body: String) -> Mock {
    server
        .mock("POST", PATH)
        .match_header("APIKeyID", "key-id")
        .match_header("APISecretKey", "key-secret")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("sensorID".into(), SENSOR.into()),
            Matcher::UrlEncoded("fromDate".into(), window.from_param()),
            Matcher::UrlEncoded("toDate".into(), window.to_param()),
        ]))
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

#[tokio::test]
async fn merges_every_sub_window() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let windows = split_range(&range, 5);

    let mut mocks = Vec::new();
    for window in &windows {
        let body = json!({
            "Method": "SensorChartMessages",
            "Result": [
                record_at(window, 90, 70.5),
                record_at(window, 30, 68.0),
                record_at(window, 60, 69.25),
            ]
        });
        mocks.push(mock_window(&mut server, window, 200, body.to_string()).await);
    }

    let report = fetcher(&server).try_fetch(&range, SENSOR).await.unwrap();

    assert_eq!(report.series.len(), 15);
    assert_eq!(report.windows_fetched, 5);
    assert_eq!(report.skipped_records, 0);
    assert!(report.failed_windows.is_empty());
    for mock in mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn malformed_records_are_skipped_and_counted() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let window = split_range(&range, 1)[0];

    let body = json!({
        "Result": [
            record_at(&window, 10, 65.0),
            {"Date": "2024-01-01 00:20:00", "Value": 66.0},
            record_at(&window, 30, 67.0),
            {"Date": "/Date(1704069000000)/", "Value": null},
            {"Date": "/Date(1704069600000)/"},
            {"Value": 68.0},
            record_at(&window, 70, 69.0),
            "garbage",
        ]
    });
    let mock = mock_window(&mut server, &window, 200, body.to_string()).await;

    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    // tokio::test runs on the current thread, so the default stays in scope
    let _guard = tracing::subscriber::set_default(subscriber);

    let report = fetcher(&server)
        .with_sub_windows(1)
        .try_fetch(&range, SENSOR)
        .await
        .unwrap();

    assert_eq!(report.series.len(), 3);
    assert_eq!(report.skipped_records, 5);
    assert_eq!(logs.lines_containing("Skipping unusable record"), 5);
    let values: Vec<f64> = report.series.readings().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![65.0, 67.0, 69.0]);
    assert_eq!(
        report.series.readings()[0].timestamp,
        parse_timestamp("2024-01-01 00:10:00").unwrap()
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_result_aborts_without_further_calls() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let windows = split_range(&range, 5);

    let first = mock_window(
        &mut server,
        &windows[0],
        200,
        json!({"Result": [record_at(&windows[0], 5, 70.0)]}).to_string(),
    )
    .await;
    let broken = mock_window(
        &mut server,
        &windows[1],
        200,
        json!({"Method": "SensorChartMessages", "Exception": "Invalid API key"}).to_string(),
    )
    .await;

    let mut untouched = Vec::new();
    for window in &windows[2..] {
        let mock = server
            .mock("POST", PATH)
            .match_body(Matcher::UrlEncoded("fromDate".into(), window.from_param()))
            .with_status(200)
            .with_body(json!({"Result": []}).to_string())
            .expect(0)
            .create_async()
            .await;
        untouched.push(mock);
    }

    let series = fetcher(&server).fetch(&range, SENSOR).await;

    assert!(series.is_empty(), "data from earlier windows must be discarded");
    first.assert_async().await;
    broken.assert_async().await;
    for mock in untouched {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn missing_result_is_a_malformed_response() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let window = split_range(&range, 1)[0];
    let _mock = mock_window(&mut server, &window, 200, json!({"Result": null}).to_string()).await;

    let err = fetcher(&server)
        .with_sub_windows(1)
        .try_fetch(&range, SENSOR)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse { window: 0, .. }));
}

#[tokio::test]
async fn non_json_body_is_a_malformed_response() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let window = split_range(&range, 1)[0];
    let _mock = mock_window(&mut server, &window, 200, "<html>maintenance</html>".to_string()).await;

    let err = fetcher(&server)
        .with_sub_windows(1)
        .try_fetch(&range, SENSOR)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MalformedResponse { .. }));
}

#[tokio::test]
async fn http_error_status_fails_the_window() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let windows = split_range(&range, 5);
    let _mock = mock_window(&mut server, &windows[0], 500, "oops".to_string()).await;

    let err = fetcher(&server).try_fetch(&range, SENSOR).await.unwrap_err();

    match err {
        FetchError::Http { window, status, body } => {
            assert_eq!(window, 0);
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "oops");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_host_is_a_network_error() {
    let client = MonnitClient::new("http://127.0.0.1:1/json/SensorChartMessages", Credentials::default())
        .unwrap();
    let fetcher = SensorFetcher::new(client);

    let err = fetcher.try_fetch(&one_day(), SENSOR).await.unwrap_err();
    assert!(matches!(err, FetchError::Network { window: 0, .. }));

    assert!(fetcher.fetch(&one_day(), SENSOR).await.is_empty());
}

#[tokio::test]
async fn best_effort_keeps_successful_windows() {
    let mut server = Server::new_async().await;
    let range = one_day();
    let windows = split_range(&range, 5);

    let mut mocks = Vec::new();
    for window in &windows {
        let mock = if window.index == 2 {
            mock_window(&mut server, window, 503, "unavailable".to_string()).await
        } else {
            let body = json!({"Result": [record_at(window, 15, 60.0 + window.index as f64)]});
            mock_window(&mut server, window, 200, body.to_string()).await
        };
        mocks.push(mock);
    }

    let report = fetcher(&server)
        .with_policy(FailurePolicy::BestEffort)
        .try_fetch(&range, SENSOR)
        .await
        .unwrap();

    assert_eq!(report.series.len(), 4);
    assert_eq!(report.windows_fetched, 4);
    assert_eq!(report.failed_windows.len(), 1);
    assert_eq!(report.failed_windows[0].window, windows[2]);
    let values: Vec<f64> = report.series.readings().iter().map(|r| r.value).collect();
    assert_eq!(values, vec![60.0, 61.0, 63.0, 64.0]);
    for mock in mocks {
        mock.assert_async().await;
    }
}
