//! Per-cycle prediction orchestration
//!
//! Consumes each snapshot in three steps:
//! 1. Append every source's score to its rolling series
//! 2. Validate active predictions that have reached their due time
//! 3. Raise at most one new prediction, subject to the global active cap
//!
//! The engine exclusively owns all series, prediction, and accuracy state.
//! Callers outside the cycle driver only read cloned data through
//! [`PredictionEngine::active_predictions_and_stats`].

use super::series::MetricSeries;
use super::types::{AccuracyStats, Prediction, PredictionStatus, Severity};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Trigger when a score falls this many standard deviations below the mean.
const ANOMALY_THRESHOLD_STD_DEV: f64 = 2.0;

/// Beyond this many standard deviations the anomaly is classified major.
const MAJOR_SEVERITY_STD_DEV: f64 = 3.0;

/// Near-constant series produce spurious triggers; require some spread.
const MIN_STD_DEV_TO_PREDICT: f64 = 1.0;

/// Global cap on concurrently active predictions.
const MAX_ACTIVE_PREDICTIONS: usize = 12;

const BASE_CONFIDENCE: f64 = 60.0;
const CONFIDENCE_PER_EXTRA_STD_DEV: f64 = 15.0;

/// Confidence scaled with anomaly depth: base 60 at the trigger threshold,
/// plus 15 points per standard deviation beyond it, clamped to 50-99.
fn dynamic_confidence(current_score: f64, mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 {
        return 50.0;
    }
    let z = (mean - current_score) / std_dev;
    let confidence = BASE_CONFIDENCE + (z - ANOMALY_THRESHOLD_STD_DEV) * CONFIDENCE_PER_EXTRA_STD_DEV;
    confidence.round().clamp(50.0, 99.0)
}

/// "princes_st_traffic" -> "Princes St Traffic"
fn display_name(source_key: &str) -> String {
    source_key
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct PredictionEngine {
    series: HashMap<String, MetricSeries>,
    predictions: HashMap<Uuid, Prediction>,
    stats: AccuracyStats,
    cycle_counter: u64,
    /// Injected clock, swapped for a fixed one in tests.
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send>,
}

impl PredictionEngine {
    pub fn new() -> Self {
        Self::with_clock(Box::new(Utc::now))
    }

    /// Engine with a custom clock, for deterministic tests.
    pub fn with_clock(now_fn: Box<dyn Fn() -> DateTime<Utc> + Send>) -> Self {
        Self {
            series: HashMap::new(),
            predictions: HashMap::new(),
            stats: AccuracyStats::default(),
            cycle_counter: 0,
            now_fn,
        }
    }

    /// Process one snapshot: update history, validate due predictions,
    /// maybe raise a new one.
    pub fn run_cycle(&mut self, snapshot: &Snapshot) {
        self.cycle_counter += 1;
        let now = (self.now_fn)();

        self.update_history(snapshot);
        self.validate_due_predictions(snapshot, now);

        if self.active_count() < MAX_ACTIVE_PREDICTIONS {
            if let Some(prediction) = self.generate_prediction(snapshot, now) {
                log::info!("🔮 New prediction: {}", prediction.summary);
                self.predictions.insert(prediction.id, prediction);
            }
        }

        if self.cycle_counter % 4 == 0 {
            log::debug!(
                "📈 Prediction engine status (cycle #{}): {} series, {} active, accuracy {:.1}%",
                self.cycle_counter,
                self.series.len(),
                self.active_count(),
                self.stats.accuracy_percent()
            );
        }
    }

    /// Cloned active predictions plus the accuracy counters. Safe to call
    /// from request-handling paths while the driver owns the mutations.
    pub fn active_predictions_and_stats(&self) -> (Vec<Prediction>, AccuracyStats) {
        let mut active: Vec<Prediction> = self
            .predictions
            .values()
            .filter(|p| p.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|p| p.created_at);
        (active, self.stats)
    }

    fn active_count(&self) -> usize {
        self.predictions.values().filter(|p| p.is_active()).count()
    }

    fn has_active_for(&self, source_key: &str) -> bool {
        self.predictions
            .values()
            .any(|p| p.is_active() && p.source_key == source_key)
    }

    /// Step 1: append every source's score to its series.
    fn update_history(&mut self, snapshot: &Snapshot) {
        for (name, result) in &snapshot.sources {
            self.series
                .entry(name.clone())
                .or_default()
                .push(result.score);
        }
    }

    /// Step 2: resolve active predictions whose due time has passed, against
    /// the snapshot currently being processed. Missing data counts as
    /// incorrect. The transition is terminal.
    fn validate_due_predictions(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) {
        for prediction in self.predictions.values_mut() {
            if !prediction.is_active() || prediction.validate_at > now {
                continue;
            }

            let outcome = match snapshot.score_of(&prediction.source_key) {
                Some(final_score) => {
                    log::info!(
                        "🧾 Validating {}: target < {:.1}, actual {:.1}",
                        prediction.source_key,
                        prediction.validation_threshold,
                        final_score
                    );
                    final_score < prediction.validation_threshold
                }
                None => {
                    log::warn!(
                        "🧾 Validating {}: no current data, marking incorrect",
                        prediction.source_key
                    );
                    false
                }
            };

            prediction.status = if outcome {
                PredictionStatus::Correct
            } else {
                PredictionStatus::Incorrect
            };
            self.stats.record(outcome);
        }
    }

    /// Step 3: scan sources in a stable order and raise a prediction for the
    /// first one whose current score sits more than 2 standard deviations
    /// below its rolling mean. At most one prediction per cycle.
    fn generate_prediction(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Option<Prediction> {
        let mut names: Vec<&String> = snapshot.sources.keys().collect();
        names.sort();

        for name in names {
            let current_score = snapshot.score_of(name)?;

            let Some((mean, std_dev)) = self.series.get(name).and_then(MetricSeries::baseline)
            else {
                continue;
            };

            if std_dev < MIN_STD_DEV_TO_PREDICT {
                continue;
            }
            if self.has_active_for(name) {
                continue;
            }

            let trigger_threshold = mean - ANOMALY_THRESHOLD_STD_DEV * std_dev;
            if current_score >= trigger_threshold {
                continue;
            }

            let z = (mean - current_score) / std_dev;
            let severity = if z > MAJOR_SEVERITY_STD_DEV {
                Severity::Major
            } else {
                Severity::Minor
            };
            let confidence = dynamic_confidence(current_score, mean, std_dev);

            return Some(Prediction {
                id: Uuid::new_v4(),
                source_key: name.clone(),
                status: PredictionStatus::Active,
                created_at: now,
                validate_at: now + Duration::minutes(severity.predicted_duration_mins()),
                severity,
                confidence,
                trigger_score: current_score,
                historical_mean_at_trigger: mean,
                validation_threshold: mean - std_dev,
                summary: format!(
                    "Potential {} anomaly on {}",
                    severity.as_str(),
                    display_name(name)
                ),
            });
        }
        None
    }
}

impl Default for PredictionEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SourceResult;
    use serde_json::json;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Engine whose clock can be advanced from the test body.
    fn make_engine(base: DateTime<Utc>) -> (PredictionEngine, Arc<AtomicI64>) {
        let offset_secs = Arc::new(AtomicI64::new(0));
        let offset = offset_secs.clone();
        let engine = PredictionEngine::with_clock(Box::new(move || {
            base + Duration::seconds(offset.load(Ordering::SeqCst))
        }));
        (engine, offset_secs)
    }

    fn make_snapshot(scores: &[(&str, f64)]) -> Snapshot {
        let mut snapshot = Snapshot::new(Utc::now());
        for (name, score) in scores {
            snapshot.sources.insert(
                name.to_string(),
                SourceResult {
                    score: *score,
                    fields: json!({}),
                    raw: Some(json!({})),
                },
            );
        }
        snapshot
    }

    /// Feed a per-source score series through the engine, one cycle each.
    fn feed(engine: &mut PredictionEngine, name: &str, scores: &[f64]) {
        for score in scores {
            engine.run_cycle(&make_snapshot(&[(name, *score)]));
        }
    }

    const STEADY: [f64; 11] = [80.0, 82.0, 79.0, 81.0, 83.0, 80.0, 78.0, 82.0, 81.0, 80.0, 79.0];

    #[test]
    fn test_steady_series_raises_no_prediction() {
        let (mut engine, _) = make_engine(Utc::now());
        feed(&mut engine, "traffic_x", &STEADY);

        let (active, stats) = engine.active_predictions_and_stats();
        assert!(active.is_empty());
        assert_eq!(stats.total_validated, 0);
    }

    #[test]
    fn test_sharp_drop_raises_major_prediction() {
        // Spec scenario: 11 readings around 80, then a drop to 20.
        let base = Utc::now();
        let (mut engine, _) = make_engine(base);
        feed(&mut engine, "traffic_x", &STEADY);
        feed(&mut engine, "traffic_x", &[20.0]);

        let (active, _) = engine.active_predictions_and_stats();
        assert_eq!(active.len(), 1);
        let p = &active[0];

        assert_eq!(p.source_key, "traffic_x");
        assert_eq!(p.severity, Severity::Major);
        assert_eq!(p.validate_at - p.created_at, Duration::minutes(30));
        assert_eq!(p.trigger_score, 20.0);
        assert!(p.validation_threshold < p.historical_mean_at_trigger);
        assert!((50.0..=99.0).contains(&p.confidence));
        assert!(p.summary.contains("Major"));
    }

    #[test]
    fn test_flat_then_drop_raises_prediction() {
        // Spec property: [50, 50, ..., 50, 10] with >= 11 points.
        let (mut engine, _) = make_engine(Utc::now());
        feed(&mut engine, "road_a", &[50.0; 11]);
        feed(&mut engine, "road_a", &[10.0]);

        let (active, _) = engine.active_predictions_and_stats();
        assert_eq!(active.len(), 1);
        let p = &active[0];
        assert!(p.validation_threshold < p.historical_mean_at_trigger);
        assert!((50.0..=99.0).contains(&p.confidence));
    }

    #[test]
    fn test_near_constant_series_never_triggers() {
        // stdev below 1.0 is insufficient spread to trust a trigger
        let (mut engine, _) = make_engine(Utc::now());
        let wiggle: Vec<f64> = (0..30).map(|i| 50.0 + (i % 2) as f64 * 0.2).collect();
        feed(&mut engine, "road_b", &wiggle);
        feed(&mut engine, "road_b", &[49.0]);

        let (active, _) = engine.active_predictions_and_stats();
        assert!(active.is_empty());
    }

    #[test]
    fn test_at_most_one_active_per_source() {
        let (mut engine, _) = make_engine(Utc::now());
        feed(&mut engine, "traffic_x", &STEADY);
        // Repeated anomalous readings while the first prediction is active
        feed(&mut engine, "traffic_x", &[20.0, 21.0, 19.0]);

        let (active, _) = engine.active_predictions_and_stats();
        assert_eq!(active.len(), 1);
    }

    #[test]
    fn test_one_prediction_per_cycle_even_with_multiple_candidates() {
        let (mut engine, _) = make_engine(Utc::now());
        // Build identical baselines for two sources in the same cycles
        for score in STEADY {
            engine.run_cycle(&make_snapshot(&[("road_a", score), ("road_b", score)]));
        }
        // Both drop in the same cycle; only the first in stable order triggers
        engine.run_cycle(&make_snapshot(&[("road_a", 20.0), ("road_b", 20.0)]));

        let (active, _) = engine.active_predictions_and_stats();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].source_key, "road_a");

        // The second qualifies on the following cycle
        engine.run_cycle(&make_snapshot(&[("road_a", 20.0), ("road_b", 20.0)]));
        let (active, _) = engine.active_predictions_and_stats();
        assert_eq!(active.len(), 2);
    }

    #[test]
    fn test_validation_correct_when_score_stays_low() {
        let base = Utc::now();
        let (mut engine, clock) = make_engine(base);
        feed(&mut engine, "traffic_x", &STEADY);
        feed(&mut engine, "traffic_x", &[20.0]);

        let (active, _) = engine.active_predictions_and_stats();
        let threshold = active[0].validation_threshold;

        // Jump past the 30-minute validation window; score still below threshold
        clock.store(31 * 60, Ordering::SeqCst);
        engine.run_cycle(&make_snapshot(&[("traffic_x", threshold - 5.0)]));

        let (active, stats) = engine.active_predictions_and_stats();
        assert!(active.is_empty());
        assert_eq!(stats.total_validated, 1);
        assert_eq!(stats.total_correct, 1);
        assert_eq!(stats.accuracy_percent(), 100.0);
    }

    #[test]
    fn test_validation_incorrect_when_score_recovers() {
        let base = Utc::now();
        let (mut engine, clock) = make_engine(base);
        feed(&mut engine, "traffic_x", &STEADY);
        feed(&mut engine, "traffic_x", &[20.0]);

        clock.store(31 * 60, Ordering::SeqCst);
        engine.run_cycle(&make_snapshot(&[("traffic_x", 85.0)]));

        let (active, stats) = engine.active_predictions_and_stats();
        assert!(active.is_empty());
        assert_eq!(stats.total_validated, 1);
        assert_eq!(stats.total_correct, 0);
        assert_eq!(stats.accuracy_percent(), 0.0);
    }

    #[test]
    fn test_validation_incorrect_when_source_missing() {
        let base = Utc::now();
        let (mut engine, clock) = make_engine(base);
        feed(&mut engine, "traffic_x", &STEADY);
        feed(&mut engine, "traffic_x", &[20.0]);

        // Source absent from the snapshot at validation time
        clock.store(31 * 60, Ordering::SeqCst);
        engine.run_cycle(&make_snapshot(&[("weather", 70.0)]));

        let (_, stats) = engine.active_predictions_and_stats();
        assert_eq!(stats.total_validated, 1);
        assert_eq!(stats.total_correct, 0);
    }

    #[test]
    fn test_terminal_status_never_changes() {
        let base = Utc::now();
        let (mut engine, clock) = make_engine(base);
        feed(&mut engine, "traffic_x", &STEADY);
        feed(&mut engine, "traffic_x", &[20.0]);

        clock.store(31 * 60, Ordering::SeqCst);
        engine.run_cycle(&make_snapshot(&[("traffic_x", 85.0)]));
        let validated_after_first = engine.stats.total_validated;

        // Many more cycles must not re-validate the terminal prediction
        for _ in 0..5 {
            engine.run_cycle(&make_snapshot(&[("traffic_x", 85.0)]));
        }
        assert_eq!(engine.stats.total_validated, validated_after_first);
        assert!(engine
            .predictions
            .values()
            .all(|p| p.status == PredictionStatus::Incorrect));
    }

    #[test]
    fn test_global_cap_blocks_new_predictions() {
        let base = Utc::now();
        let (mut engine, _) = make_engine(base);

        // Saturate the engine with 12 active predictions directly
        for i in 0..MAX_ACTIVE_PREDICTIONS {
            let id = Uuid::new_v4();
            engine.predictions.insert(
                id,
                Prediction {
                    id,
                    source_key: format!("other_{}", i),
                    status: PredictionStatus::Active,
                    created_at: base,
                    validate_at: base + Duration::hours(2),
                    severity: Severity::Minor,
                    confidence: 60.0,
                    trigger_score: 10.0,
                    historical_mean_at_trigger: 50.0,
                    validation_threshold: 40.0,
                    summary: "test".to_string(),
                },
            );
        }

        feed(&mut engine, "traffic_x", &STEADY);
        feed(&mut engine, "traffic_x", &[20.0]);

        // The anomaly qualifies, but the cap holds the line at 12
        assert_eq!(engine.active_count(), MAX_ACTIVE_PREDICTIONS);
        assert!(!engine.has_active_for("traffic_x"));
    }

    #[test]
    fn test_confidence_formula() {
        // Exactly at the trigger: base confidence
        assert_eq!(dynamic_confidence(40.0, 50.0, 5.0), 60.0);
        // One extra stdev beyond the trigger: +15
        assert_eq!(dynamic_confidence(35.0, 50.0, 5.0), 75.0);
        // Deep anomaly clamps at 99
        assert_eq!(dynamic_confidence(0.0, 90.0, 5.0), 99.0);
        // Degenerate spread falls back to 50
        assert_eq!(dynamic_confidence(40.0, 50.0, 0.0), 50.0);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("princes_st_traffic"), "Princes St Traffic");
        assert_eq!(display_name("weather"), "Weather");
    }
}
