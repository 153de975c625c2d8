//! Live transit adapter using the TfE open data vehicle locations API
//!
//! Vehicles without a destination are mid-deadrun or parked and are skipped.
//! The score is a fleet-activity proxy: how many vehicles are reporting.

use super::{round1, DataSource, FetchError, RawRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://tfe-opendata.com/api/v1/vehicle_locations";

#[derive(Debug, Deserialize)]
struct VehicleLocationsResponse {
    #[serde(default)]
    vehicles: Vec<Vehicle>,
}

#[derive(Debug, Deserialize)]
struct Vehicle {
    vehicle_id: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    speed: Option<f64>,
    destination: Option<String>,
    journey_id: Option<String>,
    vehicle_type: Option<String>,
    heading: Option<f64>,
}

pub struct TransitSource {
    client: reqwest::Client,
}

impl TransitSource {
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
impl DataSource for TransitSource {
    fn name(&self) -> &'static str {
        "transit"
    }

    async fn fetch(&self) -> Result<RawRecord, FetchError> {
        let response = self.client.get(BASE_URL).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }

        let data: VehicleLocationsResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;

        let vehicles: Vec<Value> = data
            .vehicles
            .into_iter()
            .filter(|v| v.destination.is_some())
            .map(|v| {
                json!({
                    "vehicle_id": v.vehicle_id,
                    "latitude": v.latitude,
                    "longitude": v.longitude,
                    "speed": v.speed,
                    "destination": v.destination,
                    "journey_id": v.journey_id,
                    "vehicle_type": v.vehicle_type,
                    "heading": v.heading,
                })
            })
            .collect();

        let moving = vehicles
            .iter()
            .filter(|v| v.get("speed").and_then(Value::as_f64).unwrap_or(0.0) > 0.0)
            .count();

        Ok(json!({
            "reporting_count": vehicles.len(),
            "moving_count": moving,
            "vehicles": vehicles,
        }))
    }

    /// Fleet activity proxy: number of vehicles reporting, capped at 100.
    fn score(&self, raw: &RawRecord) -> f64 {
        let reporting = raw
            .get("vehicles")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0) as f64;
        round1(reporting.min(100.0))
    }

    fn fields(&self, raw: &RawRecord) -> Value {
        let reporting = raw
            .get("vehicles")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        json!({
            "reporting_count": reporting,
            "moving_count": raw.get("moving_count"),
        })
    }

    fn fallback_score(&self) -> f64 {
        50.0
    }

    fn fallback_fields(&self) -> Value {
        json!({
            "reporting_count": Value::Null,
            "moving_count": Value::Null,
        })
    }
}
