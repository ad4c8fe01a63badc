//! Point → forecast URL → forecast document → today's summary.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::cache::TtlCache;
use crate::classify::{classify, Bands, TemperatureBand};
use crate::client::NwsClient;
use crate::error::ForecastError;
use crate::models::{ForecastDocument, GeoPoint, Period};
use crate::select::select_today;

/// Upstream identifier reported in every summary.
pub const SOURCE: &str = "api.weather.gov";

/// Values held in the shared cache.
#[derive(Debug, Clone)]
pub enum CachedValue {
    /// `points:{lat},{lon}` → forecast URL
    ForecastUrl(String),
    /// `forecast:{url}` → document
    Forecast(Arc<ForecastDocument>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub coords: Coords,
    /// Start date of the selected period, in the period's own offset
    pub date: String,
    pub today: TodaySummary,
    pub source: String,
    pub meta: SummaryMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodaySummary {
    pub name: String,
    pub short_forecast: String,
    pub temperature: TemperatureSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSummary {
    pub value: i32,
    pub unit: String,
    #[serde(rename = "type")]
    pub band: TemperatureBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMeta {
    /// Upstream document update time, RFC 3339
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
}

/// Resolves coordinates to today's classified forecast, caching both upstream
/// lookups.
///
/// Concurrent misses for the same key each fetch upstream; the last write wins.
#[derive(Debug, Clone)]
pub struct ForecastResolver {
    client: NwsClient,
    cache: Arc<TtlCache<CachedValue>>,
    bands: Bands,
}

impl ForecastResolver {
    pub fn new(client: NwsClient, cache: Arc<TtlCache<CachedValue>>, bands: Bands) -> Self {
        Self {
            client,
            cache,
            bands,
        }
    }

    pub fn cache(&self) -> &Arc<TtlCache<CachedValue>> {
        &self.cache
    }

    /// Resolve today's forecast for `point`.
    ///
    /// Cancelling `cancel` aborts any in-flight request or retry delay and
    /// returns [`ForecastError::Cancelled`]. Nothing is cached for a failed
    /// or cancelled resolution.
    ///
    /// # Errors
    /// Upstream failures, a point without a forecast URL, or a document
    /// without periods.
    #[instrument(skip(self, cancel), level = "info")]
    pub async fn resolve(
        &self,
        point: GeoPoint,
        cancel: &CancellationToken,
    ) -> Result<ForecastSummary, ForecastError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Forecast resolution cancelled");
                Err(ForecastError::Cancelled)
            }
            result = self.resolve_uncancelled(point) => result,
        }
    }

    async fn resolve_uncancelled(&self, point: GeoPoint) -> Result<ForecastSummary, ForecastError> {
        let forecast_url = self.forecast_url(point).await?;
        let document = self.forecast_document(&forecast_url).await?;
        summarize(point, &document, self.bands, Utc::now())
    }

    async fn forecast_url(&self, point: GeoPoint) -> Result<String, ForecastError> {
        let key = point.cache_key();
        if let Some(CachedValue::ForecastUrl(url)) = self.cache.get(&key) {
            tracing::debug!("Point cache hit: {}", key);
            return Ok(url);
        }

        let metadata = self.client.fetch_point(point).await?;
        let url = metadata
            .forecast_url()
            .ok_or(ForecastError::NoForecastUrl)?
            .to_string();

        self.cache.insert(key, CachedValue::ForecastUrl(url.clone()));
        Ok(url)
    }

    async fn forecast_document(&self, url: &str) -> Result<Arc<ForecastDocument>, ForecastError> {
        let key = format!("forecast:{url}");
        if let Some(CachedValue::Forecast(document)) = self.cache.get(&key) {
            if document.has_periods() {
                tracing::debug!("Forecast cache hit: {}", key);
                return Ok(document);
            }
        }

        let document = Arc::new(self.client.fetch_forecast(url).await?);
        // An empty document is a failed fetch, not a result to reuse.
        if document.has_periods() {
            self.cache
                .insert(key, CachedValue::Forecast(Arc::clone(&document)));
        }
        Ok(document)
    }
}

/// Build the summary for `now` from an already fetched document.
///
/// # Errors
/// [`ForecastError::NoPeriods`] when the document has no periods.
pub fn summarize(
    point: GeoPoint,
    document: &ForecastDocument,
    bands: Bands,
    now: DateTime<Utc>,
) -> Result<ForecastSummary, ForecastError> {
    let period = select_today(&document.periods, &now).ok_or(ForecastError::NoPeriods)?;

    Ok(ForecastSummary {
        coords: Coords {
            lat: point.lat,
            lon: point.lon,
        },
        date: period.start_time.format("%Y-%m-%d").to_string(),
        today: today_summary(period, bands),
        source: SOURCE.to_string(),
        meta: SummaryMeta {
            updated: document
                .updated_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        },
    })
}

fn today_summary(period: &Period, bands: Bands) -> TodaySummary {
    TodaySummary {
        name: period.name.clone(),
        short_forecast: period.short_forecast.clone(),
        temperature: TemperatureSummary {
            value: period.temperature,
            unit: period.temperature_unit.clone(),
            band: classify(period.temperature, bands),
        },
    }
}
