//! # citypulse
//!
//! Real-time city data aggregation and anomaly prediction pipeline.
//!
//! Every cycle the pipeline fetches five independent external feeds
//! (weather, traffic, energy, flights, transit) concurrently, merges them
//! into one timestamped snapshot with per-source failure isolation, runs a
//! rolling statistical model that raises and validates anomaly predictions,
//! and pushes the enriched snapshot to every live subscriber.
//!
//! ## Architecture
//!
//! ```text
//! DataSource adapters (N, independently fallible)
//!     |  concurrent fetch, per-source timeout
//! SnapshotAggregator -> Snapshot (always complete; fallbacks on failure)
//!     |
//! PredictionEngine (rolling series, prediction lifecycle, accuracy)
//!     |
//! Broadcaster -> all live subscribers (dead ones pruned)
//! ```
//!
//! The [`CycleDriver`] repeats this forever at a fixed rest interval until
//! cooperatively stopped. All state is in-memory and single-process.
//!
//! ## Module organization
//!
//! - `sources` - Feed adapters behind the `DataSource` trait
//! - `snapshot` - Snapshot and per-source result types
//! - `aggregator` - Concurrent fan-out fetch and merge
//! - `predictor` - Rolling series, prediction lifecycle, accuracy stats
//! - `broadcast` - Subscriber registry and fan-out delivery
//! - `pipeline` - Facade wiring the above together
//! - `driver` - The periodic cycle loop
//! - `config` - Environment-based configuration

pub mod aggregator;
pub mod broadcast;
pub mod config;
pub mod driver;
pub mod pipeline;
pub mod predictor;
pub mod snapshot;
pub mod sources;

pub use aggregator::SnapshotAggregator;
pub use broadcast::{Broadcaster, CyclePayload, SubscriberId};
pub use config::{Config, ConfigError};
pub use driver::{CycleDriver, StopHandle};
pub use pipeline::{CycleError, Pipeline};
pub use predictor::{AccuracyStats, Prediction, PredictionEngine, PredictionStatus, Severity};
pub use snapshot::{Snapshot, SourceResult};
pub use sources::{DataSource, FetchError};
