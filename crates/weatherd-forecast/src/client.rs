//! api.weather.gov HTTP client with bounded retries.

use chrono::Utc;
use reqwest::header::{ACCEPT, RETRY_AFTER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;

use crate::error::ForecastError;
use crate::models::{ForecastDocument, ForecastResponse, GeoPoint, PointMetadata};
use crate::retry::{classify_status, parse_retry_after, Attempt, RetryDecision, RetryPolicy};

pub const NWS_API_BASE: &str = "https://api.weather.gov";
const GEO_JSON: &str = "application/geo+json";

#[derive(Debug, Clone)]
pub struct NwsClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
    retry: RetryPolicy,
}

impl NwsClient {
    /// Build a client whose requests time out after `timeout`.
    ///
    /// An empty `user_agent` is accepted here; every request then fails with
    /// [`ForecastError::MissingUserAgent`] before touching the network.
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ForecastError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ForecastError::ClientBuild)?;

        Ok(Self::with_http_client(base_url, user_agent, client))
    }

    pub fn with_http_client(base_url: &str, user_agent: &str, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.trim().to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch point metadata, which carries the forecast URL for the point.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_point(&self, point: GeoPoint) -> Result<PointMetadata, ForecastError> {
        let url = format!("{}/points/{}", self.base_url, point.path_segment());
        self.get_json(&url).await
    }

    /// Fetch the forecast document at a URL obtained from [`Self::fetch_point`].
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_forecast(&self, url: &str) -> Result<ForecastDocument, ForecastError> {
        let response: ForecastResponse = self.get_json(url).await?;
        Ok(response.properties)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ForecastError> {
        if self.user_agent.is_empty() {
            return Err(ForecastError::MissingUserAgent);
        }

        let mut attempt = 0;
        loop {
            let backoff = self.retry.backoff(attempt);
            match self.attempt(url, backoff).await {
                Attempt::Done(value) => {
                    if attempt > 0 {
                        tracing::info!("nws request succeeded after {} retries", attempt);
                    }
                    return Ok(value);
                }
                Attempt::Failed(err) => {
                    tracing::debug!("nws request failed without retry: {}", err);
                    return Err(err);
                }
                Attempt::RetryAfter(delay, err) => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        tracing::error!(
                            "All {} nws attempts exhausted for {}: {}",
                            self.retry.max_attempts,
                            url,
                            err
                        );
                        return Err(err);
                    }
                    tracing::warn!(
                        "nws attempt {} of {} failed ({}), retrying in {:?}",
                        attempt,
                        self.retry.max_attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One request/response exchange. The response is consumed or dropped
    /// on every branch.
    async fn attempt<T: DeserializeOwned>(
        &self,
        url: &str,
        backoff: Duration,
    ) -> Attempt<T, ForecastError> {
        let sent = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, GEO_JSON)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            // malformed URL or header: nothing was sent and retrying cannot help
            Err(err) if err.is_builder() => {
                return Attempt::Failed(ForecastError::InvalidRequest(err))
            }
            Err(err) => return Attempt::RetryAfter(backoff, err.into()),
        };

        let status = response.status();
        match classify_status(status) {
            RetryDecision::Success => {
                let body = match response.bytes().await {
                    Ok(body) => body,
                    Err(err) => return Attempt::RetryAfter(backoff, err.into()),
                };
                match serde_json::from_slice(&body) {
                    Ok(value) => Attempt::Done(value),
                    Err(err) => Attempt::Failed(err.into()),
                }
            }
            RetryDecision::Retry => {
                let delay = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| parse_retry_after(v, Utc::now()))
                    .unwrap_or(backoff);
                tracing::warn!("nws throttled with {} for {}, delay {:?}", status, url, delay);
                Attempt::RetryAfter(delay, ForecastError::Throttled(status))
            }
            RetryDecision::Fail => {
                let body = response.text().await.unwrap_or_default();
                Attempt::Failed(ForecastError::Status {
                    status: status.as_u16(),
                    body: body.trim().to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::time::Instant;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> NwsClient {
        NwsClient::new(base_url, "weatherd-test (ops@example.com)", Duration::from_secs(5))
            .unwrap()
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(10)))
    }

    fn forecast_body() -> serde_json::Value {
        serde_json::json!({
            "properties": {
                "updated": "2024-06-01T10:15:00+00:00",
                "periods": [{
                    "name": "Today",
                    "startTime": "2024-06-01T06:00:00-04:00",
                    "endTime": "2024-06-01T18:00:00-04:00",
                    "isDaytime": true,
                    "temperature": 72,
                    "temperatureUnit": "F",
                    "shortForecast": "Sunny",
                    "detailedForecast": "Sunny, with a high near 72."
                }]
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_point_sends_required_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/points/38.900000,-77.000000"))
            .and(header("User-Agent", "weatherd-test (ops@example.com)"))
            .and(header("Accept", "application/geo+json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "properties": {
                    "forecast": format!("{}/gridpoints/LWX/97,71/forecast", mock_server.uri())
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let point = client.fetch_point(GeoPoint::new(38.9, -77.0)).await.unwrap();

        assert!(point.forecast_url().unwrap().ends_with("/gridpoints/LWX/97,71/forecast"));
    }

    #[tokio::test]
    async fn test_fetch_forecast() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gridpoints/LWX/97,71/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let doc = client
            .fetch_forecast(&format!("{}/gridpoints/LWX/97,71/forecast", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(doc.periods.len(), 1);
        assert_eq!(doc.periods[0].temperature, 72);
        assert!(doc.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_user_agent_makes_no_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = NwsClient::new(&mock_server.uri(), "  ", Duration::from_secs(5)).unwrap();
        let result = client.fetch_point(GeoPoint::new(38.9, -77.0)).await;

        assert!(matches!(result, Err(ForecastError::MissingUserAgent)));
    }

    #[tokio::test]
    async fn test_not_found_is_terminal() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_string("  Unable to provide data  \n"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let result = client.fetch_point(GeoPoint::new(0.0, 0.0)).await;

        match result {
            Err(ForecastError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "Unable to provide data");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_decode_failure_is_terminal() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let result = client.fetch_forecast(&mock_server.uri()).await;

        assert!(matches!(result, Err(ForecastError::Decode(_))));
    }

    #[tokio::test]
    async fn test_retry_after_then_backoff_then_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).append_header("Retry-After", "1"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let started = Instant::now();
        let doc = client.fetch_forecast(&mock_server.uri()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(doc.periods.len(), 1);
        // 1s from Retry-After, then 20ms of local backoff
        assert!(elapsed >= Duration::from_millis(1020), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_throttling_exhausts_attempts() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = test_client(&mock_server.uri());
        let result = client.fetch_point(GeoPoint::new(38.9, -77.0)).await;

        match result {
            Err(ForecastError::Throttled(status)) => {
                assert_eq!(status, reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            other => panic!("expected throttled error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_failure_is_retried_then_surfaced() {
        // Reserve a port, then free it so connections are refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client(&format!("http://{addr}"));
        let started = Instant::now();
        let result = client.fetch_point(GeoPoint::new(38.9, -77.0)).await;

        let err = result.unwrap_err();
        assert!(matches!(err, ForecastError::Network(_)));
        assert!(err.is_retryable());
        // two sleeps: 10ms + 20ms
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_malformed_forecast_url_is_terminal() {
        let client = test_client("http://127.0.0.1:9/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9");

        let started = Instant::now();
        let err = client.fetch_forecast("not a url").await.unwrap_err();

        assert!(matches!(err, ForecastError::InvalidRequest(_)));
        assert_eq!(err.kind(), ErrorKind::UpstreamProtocol);
        assert!(!err.is_retryable());
        // a retried request would sleep 10ms + 20ms
        assert!(started.elapsed() < Duration::from_millis(30));
    }
}
