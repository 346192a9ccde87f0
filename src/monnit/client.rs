use reqwest::Client;

use crate::config::{Config, Credentials};
use crate::error::FetchError;
use crate::fetch::SubWindow;
use crate::monnit::models::ChartMessagesResponse;

const API_KEY_HEADER: &str = "APIKeyID";
const API_SECRET_HEADER: &str = "APISecretKey";

pub struct MonnitClient {
    http_client: Client,
    endpoint: String,
    credentials: Credentials,
}

impl MonnitClient {
    /// Build a client for the `SensorChartMessages` endpoint at `endpoint`.
    ///
    /// No request timeout is set; the transport default applies.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Client` if the HTTP client cannot be constructed.
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Result<Self, FetchError> {
        let http_client = Client::builder().build().map_err(FetchError::Client)?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            credentials,
        })
    }

    /// # Errors
    ///
    /// Returns `FetchError::Client` if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(config.monnit_url.clone(), config.credentials.clone())
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the chart messages one sensor logged inside `window`.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Network` if the request fails, `FetchError::Http` on a
    /// non-success status, and `FetchError::MalformedResponse` if the body is not
    /// JSON or has no `Result` array.
    pub async fn sensor_chart_messages(
        &self,
        sensor_id: &str,
        window: &SubWindow,
    ) -> Result<ChartMessagesResponse, FetchError> {
        let from_date = window.from_param();
        let to_date = window.to_param();
        let params = [
            ("sensorID", sensor_id),
            ("fromDate", from_date.as_str()),
            ("toDate", to_date.as_str()),
        ];

        tracing::debug!(
            sensor_id,
            window = window.index,
            from = %from_date,
            to = %to_date,
            "Requesting sensor chart messages"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.credentials.key_id)
            .header(API_SECRET_HEADER, &self.credentials.secret)
            .form(&params)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                window: window.index,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                window: window.index,
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }

        let text = response.text().await.map_err(|source| FetchError::Network {
            window: window.index,
            source,
        })?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                window = window.index,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse SensorChartMessages response"
            );
            FetchError::MalformedResponse {
                window: window.index,
                reason: e.to_string(),
            }
        })
    }
}
