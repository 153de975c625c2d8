//! Traffic flow adapter for Princes Street using the TomTom flow segment API

use super::{num, round1, DataSource, FetchError, RawRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str =
    "https://api.tomtom.com/traffic/services/4/flowSegmentData/relative/10/json";
const PRINCES_ST_LAT: f64 = 55.951744;
const PRINCES_ST_LON: f64 = -3.198057;

#[derive(Debug, Deserialize)]
struct FlowResponse {
    #[serde(rename = "flowSegmentData")]
    flow_segment_data: FlowSegment,
}

#[derive(Debug, Deserialize)]
struct FlowSegment {
    #[serde(rename = "currentSpeed")]
    current_speed: f64,
    #[serde(rename = "freeFlowSpeed")]
    free_flow_speed: f64,
    #[serde(rename = "currentTravelTime")]
    current_travel_time: f64,
    #[serde(rename = "freeFlowTravelTime")]
    free_flow_travel_time: f64,
    confidence: f64,
    #[serde(rename = "roadClosure")]
    road_closure: bool,
}

pub struct TrafficSource {
    client: reqwest::Client,
    api_key: String,
}

impl TrafficSource {
    pub fn new(api_key: String, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key,
        }
    }
}

#[async_trait]
impl DataSource for TrafficSource {
    fn name(&self) -> &'static str {
        "princes_st_traffic"
    }

    async fn fetch(&self) -> Result<RawRecord, FetchError> {
        let point = format!("{},{}", PRINCES_ST_LAT, PRINCES_ST_LON);
        let response = self
            .client
            .get(BASE_URL)
            .query(&[
                ("point", point.as_str()),
                ("unit", "KMPH"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }

        let data: FlowResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;
        let segment = data.flow_segment_data;

        Ok(json!({
            "current_speed": segment.current_speed,
            "free_flow_speed": segment.free_flow_speed,
            "current_travel_time": segment.current_travel_time,
            "free_flow_travel_time": segment.free_flow_travel_time,
            "confidence": segment.confidence,
            "road_closure": segment.road_closure,
        }))
    }

    /// Flow efficiency ratio weighted by provider confidence.
    /// Higher = smoother traffic. A closed road scores 0.
    fn score(&self, raw: &RawRecord) -> f64 {
        if raw
            .get("road_closure")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return 0.0;
        }

        let current = num(raw, "current_speed");
        let free = num(raw, "free_flow_speed");

        let ratio = if free > 0.0 { current / free } else { 0.0 };
        let ratio = ratio.clamp(0.0, 1.0);

        round1(ratio * 100.0 * num(raw, "confidence"))
    }

    fn fields(&self, raw: &RawRecord) -> Value {
        json!({
            "current_speed": raw.get("current_speed"),
            "free_flow_speed": raw.get("free_flow_speed"),
            "road_closure": raw.get("road_closure"),
        })
    }

    fn fallback_score(&self) -> f64 {
        50.0
    }

    fn fallback_fields(&self) -> Value {
        json!({
            "current_speed": Value::Null,
            "free_flow_speed": Value::Null,
            "road_closure": Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_record(current: f64, free: f64, confidence: f64, closed: bool) -> RawRecord {
        json!({
            "current_speed": current,
            "free_flow_speed": free,
            "current_travel_time": 120.0,
            "free_flow_travel_time": 90.0,
            "confidence": confidence,
            "road_closure": closed,
        })
    }

    #[test]
    fn test_free_flow_scores_full_confidence() {
        let source = TrafficSource::new("key".to_string(), Duration::from_secs(10));
        assert_eq!(source.score(&make_record(50.0, 50.0, 1.0, false)), 100.0);
    }

    #[test]
    fn test_congestion_lowers_score() {
        let source = TrafficSource::new("key".to_string(), Duration::from_secs(10));
        // Half of free-flow speed at 0.9 confidence
        assert_eq!(source.score(&make_record(25.0, 50.0, 0.9, false)), 45.0);
    }

    #[test]
    fn test_road_closure_scores_zero() {
        let source = TrafficSource::new("key".to_string(), Duration::from_secs(10));
        assert_eq!(source.score(&make_record(50.0, 50.0, 1.0, true)), 0.0);
    }

    #[test]
    fn test_zero_free_flow_speed_scores_zero() {
        // Guard against division by a zero free-flow denominator
        let source = TrafficSource::new("key".to_string(), Duration::from_secs(10));
        assert_eq!(source.score(&make_record(30.0, 0.0, 1.0, false)), 0.0);
    }

    #[test]
    fn test_ratio_clamped_above_free_flow() {
        let source = TrafficSource::new("key".to_string(), Duration::from_secs(10));
        // Faster than free flow clamps to 1.0
        assert_eq!(source.score(&make_record(80.0, 50.0, 1.0, false)), 100.0);
    }
}
