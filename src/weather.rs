//! Current weather from an OpenWeatherMap-compatible API, with a mock fallback.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::fallback::race;

// ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub location: String,
    pub temperature: f64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed: f64,
    pub icon: Option<String>,
    pub is_mock: bool,
    pub fetched_at: DateTime<Utc>,
}

impl Weather {
    /// Placeholder shown when the vendor is unconfigured or unreachable.
    pub fn mock(location: &str) -> Self {
        // ---
        Weather {
            location: location.to_string(),
            temperature: 24.0,
            humidity: 65.0,
            description: "partly cloudy".into(),
            wind_speed: 3.5,
            icon: Some("02d".into()),
            is_mock: true,
            fetched_at: Utc::now(),
        }
    }
}

/// Raw vendor response
#[derive(Debug, Deserialize)]
struct RawWeather {
    name: Option<String>,
    main: RawMain,
    #[serde(default)]
    weather: Vec<RawCondition>,
    #[serde(default)]
    wind: Option<RawWind>,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    speed: f64,
}

impl RawWeather {
    fn into_weather(self, requested: &str) -> Weather {
        // ---
        let condition = self.weather.into_iter().next();
        Weather {
            location: self.name.unwrap_or_else(|| requested.to_string()),
            temperature: self.main.temp,
            humidity: self.main.humidity,
            description: condition
                .as_ref()
                .map(|c| c.description.clone())
                .unwrap_or_else(|| "unknown".into()),
            wind_speed: self.wind.map(|w| w.speed).unwrap_or(0.0),
            icon: condition.and_then(|c| c.icon),
            is_mock: false,
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    // ---
    http: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    default_location: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Option<String>,
        api_key: Option<String>,
        default_location: &str,
        timeout: Duration,
    ) -> Self {
        // ---
        WeatherClient {
            http,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            api_key,
            default_location: default_location.to_string(),
            timeout,
        }
    }

    /// Weather for `location` (or the configured default). Never fails.
    pub async fn current(&self, location: Option<&str>) -> Weather {
        // ---
        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.default_location.as_str());

        match race("weather lookup", self.timeout, self.fetch(location)).await {
            Ok(weather) => weather,
            Err(ServiceError::NotConfigured(_)) => Weather::mock(location),
            Err(e) => {
                tracing::warn!("Weather for {} unavailable, using mock: {}", location, e);
                Weather::mock(location)
            }
        }
    }

    async fn fetch(&self, location: &str) -> ServiceResult<Weather> {
        // ---
        let (base_url, api_key) = match (&self.base_url, &self.api_key) {
            (Some(url), Some(key)) => (url, key),
            _ => return Err(ServiceError::NotConfigured("WEATHER_API_URL/WEATHER_API_KEY")),
        };

        tracing::debug!("Fetching weather for {}", location);
        let resp = self
            .http
            .get(format!("{}/weather", base_url))
            .query(&[("q", location), ("appid", api_key.as_str()), ("units", "metric")])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ServiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let raw: RawWeather = serde_json::from_str(&body)?;
        Ok(raw.into_weather(location))
    }
}
