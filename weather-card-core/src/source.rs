use std::{fmt::Debug, path::PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ForecastError,
    model::{Forecast, ForecastKind, ForecastSample},
};

/// Where forecasts come from. The host decides how they are fetched.
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn forecast(&self) -> Result<Forecast, ForecastError>;
}

/// Forecast payload as pushed by the host's data layer.
#[derive(Debug, Deserialize)]
struct ForecastMessage {
    #[serde(rename = "type")]
    kind: ForecastKind,
    forecast: Vec<ForecastSample>,
}

/// Parse a forecast payload and check its ordering.
pub fn parse_forecast(json: &str) -> Result<Forecast, ForecastError> {
    let message: ForecastMessage = serde_json::from_str(json)?;
    Forecast::new(message.kind, message.forecast)
}

/// Reads a forecast payload from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ForecastSource for JsonFileSource {
    async fn forecast(&self) -> Result<Forecast, ForecastError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ForecastError::Read {
                path: self.path.clone(),
                source,
            })?;

        let forecast = parse_forecast(&contents)?;
        debug!(path = %self.path.display(), samples = forecast.samples().len(), "forecast loaded");
        Ok(forecast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HOURLY: &str = r#"{
        "type": "hourly",
        "forecast": [
            {"datetime": "2024-06-21T03:00:00Z", "temperature": 14.0, "condition": "clear-night"},
            {"datetime": "2024-06-21T04:00:00Z", "temperature": 15.5, "condition": "sunny",
             "precipitation": 0.0, "precipitation_probability": 5}
        ]
    }"#;

    #[test]
    fn parses_host_payload() {
        let forecast = parse_forecast(HOURLY).expect("valid payload");

        assert_eq!(forecast.kind(), ForecastKind::Hourly);
        assert_eq!(forecast.samples().len(), 2);
        assert_eq!(forecast.samples()[1].precipitation_probability, Some(5));
    }

    #[test]
    fn rejects_unordered_payload() {
        let json = r#"{"type": "daily", "forecast": [
            {"datetime": "2024-06-22T00:00:00Z", "temperature": 20.0, "condition": "rainy"},
            {"datetime": "2024-06-21T00:00:00Z", "temperature": 21.0, "condition": "rainy"}
        ]}"#;

        let err = parse_forecast(json).unwrap_err();
        assert!(matches!(err, ForecastError::Unordered { index: 1 }));
    }

    #[test]
    fn rejects_malformed_payload() {
        let err = parse_forecast(r#"{"type": "hourly"}"#).unwrap_err();
        assert!(matches!(err, ForecastError::Parse(_)));
    }

    #[tokio::test]
    async fn reads_forecast_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(HOURLY.as_bytes()).expect("write payload");

        let source = JsonFileSource::new(file.path());
        let forecast = source.forecast().await.expect("forecast loads");
        assert_eq!(forecast.samples().len(), 2);
    }

    #[tokio::test]
    async fn missing_file_reports_the_path() {
        let source = JsonFileSource::new("/definitely/not/here.json");
        let err = source.forecast().await.unwrap_err();

        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
