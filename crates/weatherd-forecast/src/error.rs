//! Forecast resolution errors.

use thiserror::Error;

/// Coarse classification of a [`ForecastError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing required settings; the request was never sent.
    Configuration,
    /// Network failure or throttling that outlived the retry budget.
    TransientUpstream,
    /// Unexpected status or malformed payload.
    UpstreamProtocol,
    /// Upstream answered but had nothing usable.
    DataUnavailable,
    /// The caller cancelled or its deadline passed.
    Cancelled,
}

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("nws user agent is required; set NWS_USER_AGENT")]
    MissingUserAgent,

    #[error("failed to build nws http client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("invalid nws request: {0}")]
    InvalidRequest(#[source] reqwest::Error),

    #[error("nws request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("nws throttled: {0}")]
    Throttled(reqwest::StatusCode),

    #[error("nws http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("nws response decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no forecast URL for point")]
    NoForecastUrl,

    #[error("no forecast periods available")]
    NoPeriods,

    #[error("forecast request cancelled")]
    Cancelled,

    #[error("forecast request exceeded its deadline")]
    DeadlineExceeded,
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingUserAgent | Self::ClientBuild(_) => ErrorKind::Configuration,
            Self::Network(_) | Self::Throttled(_) => ErrorKind::TransientUpstream,
            Self::InvalidRequest(_) | Self::Status { .. } | Self::Decode(_) => {
                ErrorKind::UpstreamProtocol
            }
            Self::NoForecastUrl | Self::NoPeriods => ErrorKind::DataUnavailable,
            Self::Cancelled | Self::DeadlineExceeded => ErrorKind::Cancelled,
        }
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientUpstream
    }
}
