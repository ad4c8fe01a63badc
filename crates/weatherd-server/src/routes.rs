//! Routes and handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::{middleware, Router};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weatherd_forecast::{ForecastError, ForecastResolver, GeoPoint, RetryPolicy};

use crate::middleware::{access_log, recover_panics, request_id};

/// Slack on top of the per-attempt timeouts for backoff and Retry-After sleeps.
const BACKOFF_ALLOWANCE: Duration = Duration::from_secs(2);

/// Deadline for one resolution: every attempt may use the full HTTP timeout.
pub fn request_deadline(http_timeout: Duration, retry: &RetryPolicy) -> Duration {
    http_timeout * retry.max_attempts + BACKOFF_ALLOWANCE
}

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    resolver: ForecastResolver,
    /// Deadline for a whole resolution, retries included
    request_timeout: Duration,
    /// Cancelled when in-flight resolutions must be abandoned
    abort: CancellationToken,
}

impl AppState {
    pub fn new(
        resolver: ForecastResolver,
        request_timeout: Duration,
        abort: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            request_timeout,
            abort,
        }
    }
}

/// Build the router with request id, panic recovery and access log applied.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/forecast", get(get_forecast))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(middleware::from_fn(access_log))
        .layer(middleware::from_fn(recover_panics))
        .layer(middleware::from_fn(request_id))
}

#[derive(Debug, Deserialize)]
struct ForecastParams {
    lat: Option<String>,
    lon: Option<String>,
}

async fn get_forecast(
    State(state): State<AppState>,
    Query(params): Query<ForecastParams>,
) -> Response {
    let point = match parse_lat_lon(params.lat.as_deref(), params.lon.as_deref()) {
        Ok(point) => point,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, msg),
    };

    let resolution = tokio::time::timeout(
        state.request_timeout,
        state.resolver.resolve(point, &state.abort),
    )
    .await
    .unwrap_or(Err(ForecastError::DeadlineExceeded));

    match resolution {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => {
            tracing::warn!(
                kind = ?err.kind(),
                retryable = err.is_retryable(),
                "forecast for {},{} failed: {}",
                point.lat,
                point.lon,
                err
            );
            error_response(StatusCode::BAD_GATEWAY, &err.to_string())
        }
    }
}

async fn health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "version": weatherd_core::VERSION,
        })),
    )
        .into_response()
}

/// Parse and range-check query coordinates.
fn parse_lat_lon(lat: Option<&str>, lon: Option<&str>) -> Result<GeoPoint, &'static str> {
    let lat = parse_coord(lat, 90.0).ok_or("invalid lat")?;
    let lon = parse_coord(lon, 180.0).ok_or("invalid lon")?;
    Ok(GeoPoint::new(lat, lon))
}

fn parse_coord(raw: Option<&str>, limit: f64) -> Option<f64> {
    let value: f64 = raw?.trim().parse().ok()?;
    (!value.is_nan() && (-limit..=limit).contains(&value)).then_some(value)
}

/// `{"error": <status text>, "msg": <detail>}` with the given status.
pub(crate) fn error_response(status: StatusCode, msg: &str) -> Response {
    let body = json!({
        "error": status.canonical_reason().unwrap_or("Error"),
        "msg": msg,
    });
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lat_lon() {
        let point = parse_lat_lon(Some("38.9"), Some("-77.0")).unwrap();
        assert_eq!(point, GeoPoint::new(38.9, -77.0));

        assert!(parse_lat_lon(Some("90"), Some("-180")).is_ok());
        assert!(parse_lat_lon(Some("-90"), Some("180")).is_ok());
    }

    #[test]
    fn test_request_deadline_covers_every_attempt() {
        let retry = RetryPolicy::default();
        assert_eq!(
            request_deadline(Duration::from_secs(5), &retry),
            Duration::from_secs(17)
        );
        assert_eq!(
            request_deadline(Duration::from_secs(1), &RetryPolicy::new(1, retry.initial_backoff)),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_parse_lat_lon_rejections() {
        assert_eq!(parse_lat_lon(None, Some("0")), Err("invalid lat"));
        assert_eq!(parse_lat_lon(Some("abc"), Some("0")), Err("invalid lat"));
        assert_eq!(parse_lat_lon(Some("NaN"), Some("0")), Err("invalid lat"));
        assert_eq!(parse_lat_lon(Some("90.0001"), Some("0")), Err("invalid lat"));
        assert_eq!(parse_lat_lon(Some("0"), None), Err("invalid lon"));
        assert_eq!(parse_lat_lon(Some("0"), Some("-180.5")), Err("invalid lon"));
        assert_eq!(parse_lat_lon(Some("0"), Some("inf")), Err("invalid lon"));
    }
}
