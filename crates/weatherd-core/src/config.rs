use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable naming an optional TOML base file.
pub const CONFIG_PATH_ENV: &str = "WEATHERD_CONFIG";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Log verbosity. Unknown names read as `Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Self::Debug,
            "WARN" | "WARNING" => Self::Warn,
            "ERROR" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP port to listen on
    pub port: String,

    pub log_level: LogLevel,

    /// Timeout for each outbound HTTP request
    #[serde(with = "duration_str")]
    pub http_timeout: Duration,

    /// Base URL for api.weather.gov
    pub nws_base_url: String,

    /// User-Agent sent to api.weather.gov; must include contact info
    pub nws_user_agent: String,

    /// In-memory cache TTL
    #[serde(with = "duration_str")]
    pub cache_ttl: Duration,

    /// Max temperature considered "cold"
    pub cold_max: i32,

    /// Min temperature considered "hot"
    pub hot_min: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: "8080".to_string(),
            log_level: LogLevel::Info,
            http_timeout: Duration::from_secs(5),
            nws_base_url: "https://api.weather.gov".to_string(),
            nws_user_agent: String::new(),
            cache_ttl: Duration::from_secs(10 * 60),
            cold_max: 45,
            hot_min: 85,
        }
    }
}

impl Config {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load the optional TOML base file, then apply environment overrides.
    ///
    /// The file is `$WEATHERD_CONFIG` when set (and must exist), otherwise
    /// `<config dir>/weatherd/config.toml` when present.
    ///
    /// # Errors
    /// The named file is missing, unreadable or malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.display().to_string()))
            }
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => return Ok(Self::from_env()),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reject configurations that cannot serve requests.
    ///
    /// Warnings are logged and returned alongside the config.
    ///
    /// # Errors
    /// A missing user agent, or any other validation error.
    pub fn validated(self) -> Result<(Self, ValidationResult), ConfigError> {
        let validation = self.validate();

        if self.nws_user_agent.trim().is_empty() {
            return Err(ConfigError::MissingSetting(
                "NWS_USER_AGENT is required (include contact info)".to_string(),
            ));
        }
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Parse a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    /// Malformed TOML or an unparsable duration.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("weatherd").join("config.toml"))
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Empty values count as unset; unparsable values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = get("PORT") {
            self.port = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = LogLevel::parse(&v);
        }
        if let Some(d) = get("HTTP_TIMEOUT").and_then(|v| parse_duration(&v)) {
            self.http_timeout = d;
        }
        if let Some(v) = get("NWS_BASE_URL") {
            self.nws_base_url = v;
        }
        if let Some(v) = get("NWS_USER_AGENT") {
            self.nws_user_agent = v;
        }
        if let Some(d) = get("CACHE_TTL").and_then(|v| parse_duration(&v)) {
            self.cache_ttl = d;
        }
        if let Some(n) = get("TEMP_BAND_COLD_MAX").and_then(|v| v.trim().parse().ok()) {
            self.cold_max = n;
        }
        if let Some(n) = get("TEMP_BAND_HOT_MIN").and_then(|v| v.trim().parse().ok()) {
            self.hot_min = n;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.nws_user_agent.trim().is_empty() {
            result.add_error(
                "nws_user_agent",
                "User-Agent is required by api.weather.gov (include contact info)",
            );
        }

        self.validate_url(&self.nws_base_url, "nws_base_url", &mut result);

        match self.port.parse::<u16>() {
            Ok(0) | Err(_) => {
                result.add_error("port", format!("Invalid port: {}", self.port));
            }
            Ok(_) => {}
        }

        if self.http_timeout.is_zero() {
            result.add_error("http_timeout", "Timeout must be greater than 0");
        }

        if self.cache_ttl.is_zero() {
            result.add_warning("cache_ttl", "Cache disabled (0 TTL)");
        }

        // Overlapping bands are allowed; hot takes precedence when classifying.
        if self.cold_max >= self.hot_min {
            result.add_warning(
                "temperature_bands",
                format!(
                    "cold_max ({}) is not below hot_min ({}); hot wins where they overlap",
                    self.cold_max, self.hot_min
                ),
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }
}

/// Parse a Go-style duration such as `250ms`, `5s`, `10m` or `1h30m`.
///
/// A bare `0` is accepted; anything negative or unitless is rejected.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }
    if s.is_empty() {
        return None;
    }

    let mut total_nanos: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (whole, frac) = match rest[..num_len].split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (&rest[..num_len], ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        rest = &rest[num_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos: u128 = match &rest[..unit_len] {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return None,
        };
        rest = &rest[unit_len..];

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut nanos = whole.checked_mul(unit_nanos)?;
        if !frac.is_empty() {
            let digits: u128 = frac.parse().ok()?;
            let scale = 10u128.checked_pow(u32::try_from(frac.len()).ok()?)?;
            nanos = nanos.checked_add(digits.checked_mul(unit_nanos)? / scale)?;
        }
        total_nanos = total_nanos.checked_add(nanos)?;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).ok()?;
    let subsec = u32::try_from(total_nanos % 1_000_000_000).ok()?;
    Some(Duration::new(secs, subsec))
}

/// Format a duration the way [`parse_duration`] reads it back.
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis == 0 {
        "0s".to_string()
    } else if millis % 3_600_000 == 0 {
        format!("{}h", millis / 3_600_000)
    } else if millis % 60_000 == 0 {
        format!("{}m", millis / 60_000)
    } else if millis % 1000 == 0 {
        format!("{}s", millis / 1000)
    } else {
        format!("{}ms", millis)
    }
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {s}")))
    }
}
