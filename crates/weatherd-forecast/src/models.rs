//! api.weather.gov document shapes and the coordinate type used to key them.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Geographic coordinate, assumed already validated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Cache key for the point lookup. Four decimals (~11m) so float noise
    /// does not fragment the cache.
    pub fn cache_key(&self) -> String {
        format!("points:{:.4},{:.4}", self.lat, self.lon)
    }

    /// `{lat},{lon}` path segment for the `/points` endpoint.
    pub fn path_segment(&self) -> String {
        format!("{:.6},{:.6}", self.lat, self.lon)
    }
}

/// Response from `/points/{lat},{lon}`.
#[derive(Debug, Clone, Deserialize)]
pub struct PointMetadata {
    pub properties: PointProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointProperties {
    #[serde(default)]
    pub forecast: String,
    #[serde(default)]
    pub forecast_hourly: String,
    #[serde(default)]
    pub forecast_grid_data: String,
    #[serde(default)]
    pub grid_id: String,
    #[serde(default)]
    pub grid_x: i64,
    #[serde(default)]
    pub grid_y: i64,
}

impl PointMetadata {
    pub fn forecast_url(&self) -> Option<&str> {
        let url = self.properties.forecast.trim();
        (!url.is_empty()).then_some(url)
    }
}

/// Raw forecast response; unwrapped into a [`ForecastDocument`].
#[derive(Debug, Deserialize)]
pub(crate) struct ForecastResponse {
    pub properties: ForecastDocument,
}

/// Forecast document: update time plus ordered periods.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastDocument {
    #[serde(default, rename = "updated")]
    pub updated_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub periods: Vec<Period>,
}

impl ForecastDocument {
    /// A document without periods is treated as not fetched yet.
    pub fn has_periods(&self) -> bool {
        !self.periods.is_empty()
    }
}

/// One named forecast period ("Today", "Tonight", "Wednesday", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    #[serde(default)]
    pub name: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub is_daytime: bool,
    #[serde(default)]
    pub temperature: i32,
    #[serde(default)]
    pub temperature_unit: String,
    #[serde(default)]
    pub short_forecast: String,
    #[serde(default)]
    pub detailed_forecast: String,
}
