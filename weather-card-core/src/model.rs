use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

use crate::error::ForecastError;

/// Weather state token as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    ClearNight,
    Cloudy,
    Exceptional,
    Fog,
    Hail,
    Lightning,
    LightningRainy,
    Partlycloudy,
    Pouring,
    Rainy,
    Snowy,
    SnowyRainy,
    Sunny,
    Windy,
    WindyVariant,
}

impl Condition {
    /// Swap the clear-sky token so it matches the time of day.
    pub fn for_time_of_day(self, night: bool) -> Self {
        match (self, night) {
            (Condition::Sunny, true) => Condition::ClearNight,
            (Condition::ClearNight, false) => Condition::Sunny,
            (other, _) => other,
        }
    }
}

/// One forecast entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub datetime: DateTime<Utc>,
    pub temperature: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templow: Option<f64>,
    pub condition: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<u8>,
    /// Explicit day/night flag from the data source; wins over solar times.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_daytime: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastKind {
    Daily,
    Hourly,
    TwiceDaily,
}

impl ForecastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastKind::Daily => "daily",
            ForecastKind::Hourly => "hourly",
            ForecastKind::TwiceDaily => "twice_daily",
        }
    }

    pub const fn all() -> &'static [ForecastKind] {
        &[ForecastKind::Daily, ForecastKind::Hourly, ForecastKind::TwiceDaily]
    }
}

impl fmt::Display for ForecastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ForecastKind {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "daily" => Ok(ForecastKind::Daily),
            "hourly" => Ok(ForecastKind::Hourly),
            "twice_daily" => Ok(ForecastKind::TwiceDaily),
            _ => Err(anyhow::anyhow!(
                "Unknown forecast type '{value}'. Supported types: daily, hourly, twice_daily."
            )),
        }
    }
}

impl ForecastSample {
    fn out_of_range_field(&self) -> Option<&'static str> {
        if self.precipitation.is_some_and(|p| !p.is_finite() || p < 0.0) {
            return Some("precipitation");
        }
        if self.precipitation_probability.is_some_and(|p| p > 100) {
            return Some("precipitation_probability");
        }
        None
    }
}

/// An ordered, immutable forecast. A new forecast replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    kind: ForecastKind,
    samples: Vec<ForecastSample>,
}

impl Forecast {
    /// Build a forecast, rejecting samples that are not ascending by datetime
    /// or carry impossible precipitation values.
    pub fn new(kind: ForecastKind, samples: Vec<ForecastSample>) -> Result<Self, ForecastError> {
        for (index, sample) in samples.iter().enumerate() {
            if let Some(field) = sample.out_of_range_field() {
                return Err(ForecastError::OutOfRange { index, field });
            }
        }

        if let Some(index) = samples
            .windows(2)
            .position(|pair| pair[1].datetime < pair[0].datetime)
        {
            return Err(ForecastError::Unordered { index: index + 1 });
        }

        Ok(Self { kind, samples })
    }

    pub fn kind(&self) -> ForecastKind {
        self.kind
    }

    pub fn samples(&self) -> &[ForecastSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A validated latitude/longitude pair.
///
/// Construction fails for non-finite or out-of-range values, so a partially
/// valid location cannot exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoCoordinates {
    latitude: f64,
    longitude: f64,
}

impl GeoCoordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        valid.then_some(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Bit-exact key for caches.
    pub(crate) fn cache_key(&self) -> (u64, u64) {
        (self.latitude.to_bits(), self.longitude.to_bits())
    }
}
