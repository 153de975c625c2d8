//! Data source adapters
//!
//! Each adapter wraps one external feed behind the [`DataSource`] trait:
//! an async `fetch()` returning a normalized JSON record, a pure `score()`
//! mapping that record to 0-100, and configured fallbacks used by the
//! aggregator when the fetch fails.
//!
//! Adapters are independently fallible. Nothing here is allowed to take the
//! cycle down: every failure surfaces as a [`FetchError`] that the aggregator
//! converts into the source's fallback entry.
//!
//! ## Module organization
//!
//! - `weather` - Open-Meteo current conditions
//! - `traffic` - TomTom flow segment data
//! - `energy` - GB grid carbon intensity and generation mix
//! - `flights` - OpenSky state vectors around Edinburgh Airport
//! - `transit` - TfE live vehicle locations

pub mod energy;
pub mod flights;
pub mod traffic;
pub mod transit;
pub mod weather;

use async_trait::async_trait;
use serde_json::Value;

/// Normalized payload produced by an adapter's fetch. A flat JSON object with
/// adapter-specific keys; the score formula reads from it.
pub type RawRecord = Value;

/// Failure modes at the adapter call boundary.
#[derive(Debug)]
pub enum FetchError {
    /// Network-level failure (DNS, connect, TLS, read).
    Transport(reqwest::Error),
    /// Non-success HTTP status from the provider.
    BadStatus(reqwest::StatusCode),
    /// Response decoded but a required field was missing or mistyped.
    MalformedPayload(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "transport error: {}", e),
            FetchError::BadStatus(status) => write!(f, "provider returned {}", status),
            FetchError::MalformedPayload(msg) => write!(f, "malformed payload: {}", msg),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Transport(e)
    }
}

/// One independent external data feed.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Unique snapshot key (e.g. `"princes_st_traffic"`).
    fn name(&self) -> &'static str;

    /// Fetch and normalize the latest reading.
    async fn fetch(&self) -> Result<RawRecord, FetchError>;

    /// Convert a well-formed record to a 0-100 score. Pure.
    fn score(&self, raw: &RawRecord) -> f64;

    /// Compact descriptive attributes for the snapshot entry.
    fn fields(&self, raw: &RawRecord) -> Value;

    /// Score substituted when the fetch fails.
    fn fallback_score(&self) -> f64;

    /// Descriptive attributes substituted when the fetch fails. Convention:
    /// "Unknown" for text fields, null for numeric ones, so consumers always
    /// see a stably-shaped payload.
    fn fallback_fields(&self) -> Value;
}

/// Round to one decimal, matching the provider-facing score convention.
pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Read a required f64 field from a normalized record.
pub(crate) fn num(raw: &RawRecord, key: &str) -> f64 {
    raw.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}
