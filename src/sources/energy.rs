//! Grid energy adapter using the National Grid ESO carbon intensity API
//!
//! GB-wide data serves as a proxy for the city's energy metabolism. Two
//! endpoints are combined per fetch: current intensity and the generation mix.

use super::{num, round1, DataSource, FetchError, RawRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://api.carbonintensity.org.uk";

#[derive(Debug, Deserialize)]
struct IntensityResponse {
    data: Vec<IntensityEntry>,
}

#[derive(Debug, Deserialize)]
struct IntensityEntry {
    intensity: Intensity,
}

#[derive(Debug, Deserialize)]
struct Intensity {
    actual: Option<f64>,
    forecast: Option<f64>,
    index: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: GenerationData,
}

#[derive(Debug, Deserialize)]
struct GenerationData {
    generationmix: Vec<FuelShare>,
}

#[derive(Debug, Clone, Deserialize)]
struct FuelShare {
    fuel: String,
    perc: f64,
}

pub struct EnergySource {
    client: reqwest::Client,
}

impl EnergySource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    async fn fetch_intensity(&self) -> Result<IntensityEntry, FetchError> {
        let response = self
            .client
            .get(format!("{}/intensity", BASE_URL))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }
        let body: IntensityResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;
        body.data
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::MalformedPayload("empty intensity data".to_string()))
    }

    async fn fetch_generation_mix(&self) -> Result<Vec<FuelShare>, FetchError> {
        let response = self
            .client
            .get(format!("{}/generation", BASE_URL))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }
        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;
        Ok(body.data.generationmix)
    }
}

#[async_trait]
impl DataSource for EnergySource {
    fn name(&self) -> &'static str {
        "energy"
    }

    async fn fetch(&self) -> Result<RawRecord, FetchError> {
        let intensity = self.fetch_intensity().await?;
        let mix = self.fetch_generation_mix().await?;

        let dominant = mix
            .iter()
            .max_by(|a, b| a.perc.total_cmp(&b.perc))
            .cloned()
            .ok_or_else(|| FetchError::MalformedPayload("empty generation mix".to_string()))?;

        // The actual reading lags by a half-hour settlement period; fall back
        // to the forecast when it is not yet published.
        let carbon_intensity = intensity
            .intensity
            .actual
            .or(intensity.intensity.forecast)
            .ok_or_else(|| {
                FetchError::MalformedPayload("no actual or forecast intensity".to_string())
            })?;

        Ok(json!({
            "carbon_intensity": carbon_intensity,
            "intensity_forecast": intensity.intensity.forecast,
            "intensity_index": intensity.intensity.index,
            "generation_mix": mix.iter()
                .map(|f| json!({"fuel": f.fuel, "perc": f.perc}))
                .collect::<Vec<_>>(),
            "dominant_fuel": dominant.fuel,
            "dominant_fuel_percentage": dominant.perc,
        }))
    }

    /// Inverse map of carbon intensity: under 50 gCO2/kWh scores 100,
    /// over 400 scores 0, linear in between.
    fn score(&self, raw: &RawRecord) -> f64 {
        let intensity = num(raw, "carbon_intensity");

        let score = if intensity <= 50.0 {
            100.0
        } else if intensity >= 400.0 {
            0.0
        } else {
            100.0 * (1.0 - (intensity - 50.0) / 350.0)
        };
        round1(score)
    }

    fn fields(&self, raw: &RawRecord) -> Value {
        json!({
            "carbon_intensity": raw.get("carbon_intensity"),
            "dominant_fuel": raw.get("dominant_fuel"),
        })
    }

    fn fallback_score(&self) -> f64 {
        50.0
    }

    fn fallback_fields(&self) -> Value {
        json!({
            "carbon_intensity": Value::Null,
            "dominant_fuel": "Unknown",
        })
    }
}
