//! Anomaly prediction engine
//!
//! Maintains a rolling statistical model per scored source, raises predictions
//! when a score drops well below its rolling mean, validates them when their
//! window expires, and tracks rolling accuracy.
//!
//! ## Module organization
//!
//! - `series` - Bounded rolling score window with mean/stdev
//! - `types` - Prediction, severity, status, and accuracy counters
//! - `engine` - Per-cycle orchestration (update, validate, generate)

pub mod engine;
pub mod series;
pub mod types;

pub use engine::PredictionEngine;
pub use series::MetricSeries;
pub use types::{AccuracyStats, Prediction, PredictionStatus, Severity};
