//! Snapshot types - the unified per-cycle output of the aggregator
//!
//! A `Snapshot` is one timestamped merge of every configured source's latest
//! result. The sources map is never partial: a failed fetch still produces an
//! entry, carrying that source's configured fallback score and "Unknown"
//! descriptive fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Per-source entry in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResult {
    /// Normalized 0 (worst) - 100 (best) score. May be the configured
    /// fallback default when the fetch failed.
    pub score: f64,
    /// Source-specific descriptive attributes (temperature, speed, carbon
    /// intensity, ...). Opaque to the pipeline core.
    pub fields: Value,
    /// Original normalized payload, or None when the fetch failed.
    pub raw: Option<Value>,
}

impl SourceResult {
    /// Build the degraded entry used when a source fetch fails.
    pub fn fallback(score: f64, fields: Value) -> Self {
        Self {
            score,
            fields,
            raw: None,
        }
    }

    /// True when this entry was produced from live data.
    pub fn is_live(&self) -> bool {
        self.raw.is_some()
    }
}

/// One complete merge of all configured sources, produced once per cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture instant (aggregation start time).
    pub timestamp: DateTime<Utc>,
    /// Source name -> result. Contains exactly the configured source set.
    pub sources: HashMap<String, SourceResult>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            sources: HashMap::new(),
        }
    }

    /// Score for a named source, if present.
    pub fn score_of(&self, name: &str) -> Option<f64> {
        self.sources.get(name).map(|r| r.score)
    }
}
