use serde::{Deserialize, Serialize};

/// Temperature thresholds used to band a forecast temperature.
///
/// Expected to satisfy `cold_max < hot_min`, but this is not enforced. When
/// the bands overlap the hot check runs first and wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bands {
    /// `temperature <= cold_max` is cold
    pub cold_max: i32,
    /// `temperature >= hot_min` is hot
    pub hot_min: i32,
}

impl Default for Bands {
    fn default() -> Self {
        Self {
            cold_max: 45,
            hot_min: 85,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureBand {
    Hot,
    Cold,
    Moderate,
}

impl TemperatureBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "hot",
            Self::Cold => "cold",
            Self::Moderate => "moderate",
        }
    }
}

impl std::fmt::Display for TemperatureBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band a temperature: hot is checked before cold.
pub fn classify(temperature: i32, bands: Bands) -> TemperatureBand {
    if temperature >= bands.hot_min {
        TemperatureBand::Hot
    } else if temperature <= bands.cold_max {
        TemperatureBand::Cold
    } else {
        TemperatureBand::Moderate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        let bands = Bands::default();
        assert_eq!(classify(45, bands), TemperatureBand::Cold);
        assert_eq!(classify(46, bands), TemperatureBand::Moderate);
        assert_eq!(classify(84, bands), TemperatureBand::Moderate);
        assert_eq!(classify(85, bands), TemperatureBand::Hot);
    }

    #[test]
    fn test_full_range_against_definition() {
        let bands = Bands {
            cold_max: 45,
            hot_min: 85,
        };
        for t in -60..=130 {
            let expected = if t >= 85 {
                TemperatureBand::Hot
            } else if t <= 45 {
                TemperatureBand::Cold
            } else {
                TemperatureBand::Moderate
            };
            assert_eq!(classify(t, bands), expected, "temperature {t}");
        }
    }

    #[test]
    fn test_inverted_bands_prefer_hot() {
        let bands = Bands {
            cold_max: 80,
            hot_min: 60,
        };
        assert_eq!(classify(70, bands), TemperatureBand::Hot);
        assert_eq!(classify(59, bands), TemperatureBand::Cold);
    }

    #[test]
    fn test_band_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TemperatureBand::Moderate).unwrap(),
            "\"moderate\""
        );
        assert_eq!(TemperatureBand::Hot.to_string(), "hot");
    }
}
