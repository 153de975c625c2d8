//! Flight activity adapter using the OpenSky Network state vector API
//!
//! Classifies aircraft inside the Edinburgh Airport bounding box by vertical
//! rate: descending = arriving, climbing = departing, otherwise en-route.
//! On-ground aircraft are counted separately and excluded from activity.

use super::{round1, DataSource, FetchError, RawRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://opensky-network.org/api/states/all";

/// lamin, lomin, lamax, lomax around Edinburgh Airport.
const AIRPORT_BBOX: [f64; 4] = [55.89, -3.45, 56.01, -3.25];

/// Vertical rates inside this band (m/s) are treated as level flight.
const LEVEL_FLIGHT_BAND: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct StatesResponse {
    /// Null when no aircraft are in the area.
    states: Option<Vec<Vec<Value>>>,
}

pub struct FlightSource {
    client: reqwest::Client,
}

impl FlightSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

/// Extract the fields we use from one raw state vector.
/// Indices per the OpenSky REST docs: 1 callsign, 5 lon, 6 lat,
/// 8 on_ground, 10 true_track, 11 vertical_rate.
fn flight_info(state: &[Value]) -> Value {
    json!({
        "callsign": state
            .get(1)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A"),
        "longitude": state.get(5),
        "latitude": state.get(6),
        "vertical_rate": state.get(11).and_then(Value::as_f64).unwrap_or(0.0),
        "heading": state.get(10),
    })
}

#[async_trait]
impl DataSource for FlightSource {
    fn name(&self) -> &'static str {
        "flights"
    }

    async fn fetch(&self) -> Result<RawRecord, FetchError> {
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("lamin", AIRPORT_BBOX[0]),
                ("lomin", AIRPORT_BBOX[1]),
                ("lamax", AIRPORT_BBOX[2]),
                ("lomax", AIRPORT_BBOX[3]),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }

        let data: StatesResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;

        let mut arriving = Vec::new();
        let mut departing = Vec::new();
        let mut en_route = Vec::new();
        let mut on_ground_count = 0u32;

        for state in data.states.unwrap_or_default() {
            let is_on_ground = state.get(8).and_then(Value::as_bool).unwrap_or(false);
            if is_on_ground {
                on_ground_count += 1;
                continue;
            }

            let vertical_rate = state.get(11).and_then(Value::as_f64).unwrap_or(0.0);
            let info = flight_info(&state);

            if vertical_rate < -LEVEL_FLIGHT_BAND {
                arriving.push(info);
            } else if vertical_rate > LEVEL_FLIGHT_BAND {
                departing.push(info);
            } else {
                en_route.push(info);
            }
        }

        let total_in_air = arriving.len() + departing.len() + en_route.len();
        Ok(json!({
            "arriving": arriving,
            "departing": departing,
            "en_route": en_route,
            "on_ground_count": on_ground_count,
            "total_in_air": total_in_air,
        }))
    }

    /// Activity score weighted toward active takeoffs and landings,
    /// capped at 100 (~10 active aircraft is already high activity).
    fn score(&self, raw: &RawRecord) -> f64 {
        let count = |key: &str| {
            raw.get(key)
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0) as f64
        };

        let activity = count("arriving") * 10.0 + count("departing") * 10.0 + count("en_route") * 2.0;
        round1(activity.min(100.0))
    }

    fn fields(&self, raw: &RawRecord) -> Value {
        let count = |key: &str| {
            raw.get(key)
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0)
        };
        json!({
            "arriving_count": count("arriving"),
            "departing_count": count("departing"),
            "total_in_air": raw.get("total_in_air"),
        })
    }

    /// No observed activity rather than "average" activity: an outage should
    /// read as a quiet airfield, not a moderate one.
    fn fallback_score(&self) -> f64 {
        0.0
    }

    fn fallback_fields(&self) -> Value {
        json!({
            "arriving_count": 0,
            "departing_count": 0,
            "total_in_air": 0,
        })
    }
}
