//! Today's forecast for a coordinate, backed by api.weather.gov.
//!
//! Resolves a point to its forecast document (both cached in memory with a
//! TTL), picks the period that represents "today" and classifies its
//! temperature into a coarse band.

pub mod cache;
pub mod classify;
pub mod client;
pub mod error;
pub mod models;
pub mod resolver;
pub mod retry;
pub mod select;

pub use cache::TtlCache;
pub use classify::{classify, Bands, TemperatureBand};
pub use client::NwsClient;
pub use error::{ErrorKind, ForecastError};
pub use models::{ForecastDocument, GeoPoint, Period, PointMetadata};
pub use resolver::{summarize, CachedValue, ForecastResolver, ForecastSummary, SOURCE};
pub use retry::RetryPolicy;
pub use select::select_today;
