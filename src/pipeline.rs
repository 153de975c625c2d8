//! Pipeline facade - wires aggregator, prediction engine, and broadcaster
//!
//! One instance owns the whole per-cycle state and is shared between the
//! cycle driver (the only mutator) and request-handling paths (read-only
//! accessors plus subscribe/unsubscribe). The engine sits behind a mutex so
//! readers never observe a torn update; the driver holds the lock only for
//! the brief engine step, never across fetch or delivery.

use crate::aggregator::SnapshotAggregator;
use crate::broadcast::{Broadcaster, CyclePayload, SubscriberId};
use crate::predictor::{AccuracyStats, Prediction, PredictionEngine};
use crate::snapshot::Snapshot;
use crate::sources::DataSource;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Failure of one cycle's body. Never fatal: the driver logs it and carries
/// on at the next interval.
#[derive(Debug)]
pub enum CycleError {
    /// The engine mutex was poisoned by a panic in a previous cycle.
    EngineUnavailable,
    /// The cycle task itself panicked.
    Panicked(String),
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleError::EngineUnavailable => write!(f, "prediction engine unavailable"),
            CycleError::Panicked(msg) => write!(f, "cycle panicked: {}", msg),
        }
    }
}

impl std::error::Error for CycleError {}

pub struct Pipeline {
    aggregator: SnapshotAggregator,
    engine: Mutex<PredictionEngine>,
    broadcaster: Broadcaster,
    latest_payload: Mutex<Option<Arc<CyclePayload>>>,
}

impl Pipeline {
    pub fn new(
        sources: Vec<Arc<dyn DataSource>>,
        fetch_timeout: Duration,
        subscriber_buffer: usize,
    ) -> Self {
        Self {
            aggregator: SnapshotAggregator::new(sources, fetch_timeout),
            engine: Mutex::new(PredictionEngine::new()),
            broadcaster: Broadcaster::new(subscriber_buffer),
            latest_payload: Mutex::new(None),
        }
    }

    /// Pipeline with a custom engine, for tests with an injected clock.
    pub fn with_engine(
        sources: Vec<Arc<dyn DataSource>>,
        fetch_timeout: Duration,
        subscriber_buffer: usize,
        engine: PredictionEngine,
    ) -> Self {
        Self {
            aggregator: SnapshotAggregator::new(sources, fetch_timeout),
            engine: Mutex::new(engine),
            broadcaster: Broadcaster::new(subscriber_buffer),
            latest_payload: Mutex::new(None),
        }
    }

    /// One full cycle: fetch everything, run the engine, broadcast.
    pub async fn run_cycle(&self) -> Result<(), CycleError> {
        let snapshot = self.aggregator.aggregate().await;

        let (predictions, stats) = {
            let mut engine = self
                .engine
                .lock()
                .map_err(|_| CycleError::EngineUnavailable)?;
            engine.run_cycle(&snapshot);
            engine.active_predictions_and_stats()
        };

        let payload = Arc::new(CyclePayload {
            snapshot,
            predictions,
            stats: stats.into(),
        });

        if let Ok(mut latest) = self.latest_payload.lock() {
            *latest = Some(payload.clone());
        }
        self.broadcaster.broadcast(payload);
        Ok(())
    }

    /// Most recent snapshot, for synchronous reads.
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.aggregator.latest_snapshot()
    }

    /// Cloned active predictions and accuracy counters. Callable concurrently
    /// with a running cycle.
    pub fn active_predictions_and_stats(&self) -> (Vec<Prediction>, AccuracyStats) {
        match self.engine.lock() {
            Ok(engine) => engine.active_predictions_and_stats(),
            Err(_) => (Vec::new(), AccuracyStats::default()),
        }
    }

    /// Register a live subscriber. If a cycle has already completed, the
    /// cached payload is delivered immediately.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Arc<CyclePayload>>) {
        let initial = self
            .latest_payload
            .lock()
            .ok()
            .and_then(|guard| guard.clone());
        self.broadcaster.subscribe(initial)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.broadcaster.unsubscribe(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.aggregator.source_names()
    }
}
