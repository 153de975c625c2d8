//! Prediction lifecycle types and accuracy counters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How far below the baseline the anomaly sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Minor,
    Major,
}

impl Severity {
    /// How long the anomaly is predicted to persist, which also sets the
    /// validation due time.
    pub fn predicted_duration_mins(&self) -> i64 {
        match self {
            Severity::Minor => 15,
            Severity::Major => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Minor => "Minor",
            Severity::Major => "Major",
        }
    }
}

/// Lifecycle state. Terminal once it leaves `Active`; the transition happens
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Active,
    Correct,
    Incorrect,
}

/// A claim that an anomalous condition on one source will persist for a
/// bounded duration, validated against the actual score at the due time.
///
/// `source_key`, `severity`, and the thresholds are fixed at creation; only
/// `status` ever mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: Uuid,
    pub source_key: String,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    pub validate_at: DateTime<Utc>,
    pub severity: Severity,
    /// 50-99, scaled with anomaly depth.
    pub confidence: f64,
    pub trigger_score: f64,
    pub historical_mean_at_trigger: f64,
    /// Score below this at validation time counts as correct. One stdev below
    /// the mean at trigger time, looser than the 2-stdev trigger.
    pub validation_threshold: f64,
    /// Human-readable one-liner for display.
    pub summary: String,
}

impl Prediction {
    pub fn is_active(&self) -> bool {
        self.status == PredictionStatus::Active
    }
}

/// Process-lifetime validation counters. Both are monotonically
/// non-decreasing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccuracyStats {
    pub total_validated: u64,
    pub total_correct: u64,
}

impl AccuracyStats {
    /// Percentage of validated predictions that were correct. Defined as 100
    /// before anything has been validated.
    pub fn accuracy_percent(&self) -> f64 {
        if self.total_validated == 0 {
            return 100.0;
        }
        let pct = self.total_correct as f64 / self.total_validated as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    pub fn record(&mut self, correct: bool) {
        self.total_validated += 1;
        if correct {
            self.total_correct += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_is_100_before_any_validation() {
        let stats = AccuracyStats::default();
        assert_eq!(stats.accuracy_percent(), 100.0);
    }

    #[test]
    fn test_accuracy_tracks_counters() {
        let mut stats = AccuracyStats::default();
        stats.record(true);
        stats.record(false);
        stats.record(true);

        assert_eq!(stats.total_validated, 3);
        assert_eq!(stats.total_correct, 2);
        assert_eq!(stats.accuracy_percent(), 66.67);
    }

    #[test]
    fn test_severity_durations() {
        assert_eq!(Severity::Minor.predicted_duration_mins(), 15);
        assert_eq!(Severity::Major.predicted_duration_mins(), 30);
    }

    #[test]
    fn test_prediction_serializes_to_json() {
        let now = Utc::now();
        let prediction = Prediction {
            id: Uuid::new_v4(),
            source_key: "princes_st_traffic".to_string(),
            status: PredictionStatus::Active,
            created_at: now,
            validate_at: now + chrono::Duration::minutes(30),
            severity: Severity::Major,
            confidence: 78.0,
            trigger_score: 20.0,
            historical_mean_at_trigger: 75.4,
            validation_threshold: 57.9,
            summary: "Potential Major anomaly on Princes St Traffic".to_string(),
        };

        let json = serde_json::to_value(&prediction).unwrap();
        assert_eq!(json["id"], prediction.id.to_string());
        assert_eq!(json["status"], "active");
        assert_eq!(json["source_key"], "princes_st_traffic");

        let back: Prediction = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, prediction.id);
        assert_eq!(back.severity, Severity::Major);
    }
}
