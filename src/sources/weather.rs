//! Weather adapter for Edinburgh using the Open-Meteo API

use super::{num, round1, DataSource, FetchError, RawRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";
const EDINBURGH_LAT: f64 = 55.9533;
const EDINBURGH_LON: f64 = -3.1883;

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    temperature_2m: f64,
    apparent_temperature: f64,
    relative_humidity_2m: f64,
    weather_code: i64,
    cloud_cover: f64,
    wind_speed_10m: f64,
}

/// Map WMO weather codes to short descriptions.
fn describe(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Foggy",
        51 => "Light drizzle",
        61 => "Light rain",
        63 => "Rain",
        65 => "Heavy rain",
        71 => "Light snow",
        95 => "Thunderstorm",
        _ => "Unknown",
    }
}

pub struct WeatherSource {
    client: reqwest::Client,
}

impl WeatherSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl DataSource for WeatherSource {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn fetch(&self) -> Result<RawRecord, FetchError> {
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("latitude", EDINBURGH_LAT.to_string()),
                ("longitude", EDINBURGH_LON.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,apparent_temperature,\
                     weather_code,cloud_cover,wind_speed_10m"
                        .to_string(),
                ),
                ("timezone", "Europe/London".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }

        let data: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;
        let current = data.current;

        Ok(json!({
            "temperature": current.temperature_2m,
            "feels_like": current.apparent_temperature,
            "humidity": current.relative_humidity_2m,
            "description": describe(current.weather_code),
            "wind_speed": current.wind_speed_10m,
            "cloudiness": current.cloud_cover,
        }))
    }

    /// Weighted blend of temperature, cloud cover, and wind.
    /// 15-22C is treated as optimal for Edinburgh.
    fn score(&self, raw: &RawRecord) -> f64 {
        let temp = num(raw, "temperature");
        let temp_score = if (15.0..=22.0).contains(&temp) {
            100.0
        } else if temp < 15.0 {
            (100.0 - (15.0 - temp) * 8.0).max(0.0)
        } else {
            (100.0 - (temp - 22.0) * 5.0).max(0.0)
        };

        let cloud_score = 100.0 - num(raw, "cloudiness") * 0.5;
        let wind_score = (100.0 - num(raw, "wind_speed") * 3.0).max(0.0);

        round1(temp_score * 0.4 + cloud_score * 0.3 + wind_score * 0.3)
    }

    fn fields(&self, raw: &RawRecord) -> Value {
        json!({
            "temperature": raw.get("temperature"),
            "description": raw.get("description"),
            "wind_speed": raw.get("wind_speed"),
        })
    }

    fn fallback_score(&self) -> f64 {
        50.0
    }

    fn fallback_fields(&self) -> Value {
        json!({
            "temperature": Value::Null,
            "description": "Unknown",
            "wind_speed": Value::Null,
        })
    }
}
