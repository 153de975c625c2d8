//! Snapshot aggregator - concurrent fan-out fetch with per-source isolation
//!
//! Runs every adapter's fetch concurrently each cycle, each wrapped in its own
//! timeout, and merges the results into one snapshot. `aggregate()` never
//! fails: an error, timeout, or panic in one adapter degrades only that
//! source's entry to its configured fallback.
//!
//! The most recent snapshot is cached so a late-joining subscriber or a
//! synchronous query gets data immediately instead of waiting a full cycle.

use crate::snapshot::{Snapshot, SourceResult};
use crate::sources::DataSource;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

pub struct SnapshotAggregator {
    sources: Vec<Arc<dyn DataSource>>,
    fetch_timeout: Duration,
    latest: Mutex<Option<Snapshot>>,
}

impl SnapshotAggregator {
    pub fn new(sources: Vec<Arc<dyn DataSource>>, fetch_timeout: Duration) -> Self {
        Self {
            sources,
            fetch_timeout,
            latest: Mutex::new(None),
        }
    }

    /// Names of all configured sources, in registration order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fetch all sources concurrently and merge into one snapshot.
    ///
    /// The snapshot is stamped with the aggregation start time and always
    /// contains every configured source name, fallbacks included.
    pub async fn aggregate(&self) -> Snapshot {
        let started_at = Utc::now();

        let mut handles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let task_source = source.clone();
            let per_fetch_timeout = self.fetch_timeout;
            let handle = tokio::spawn(async move {
                let name = task_source.name();
                match timeout(per_fetch_timeout, task_source.fetch()).await {
                    Ok(Ok(raw)) => {
                        let score = task_source.score(&raw);
                        SourceResult {
                            score,
                            fields: task_source.fields(&raw),
                            raw: Some(raw),
                        }
                    }
                    Ok(Err(e)) => {
                        log::warn!("⚠️  {} fetch failed: {}", name, e);
                        SourceResult::fallback(
                            task_source.fallback_score(),
                            task_source.fallback_fields(),
                        )
                    }
                    Err(_) => {
                        log::warn!(
                            "⚠️  {} fetch timed out after {:?}",
                            name,
                            per_fetch_timeout
                        );
                        SourceResult::fallback(
                            task_source.fallback_score(),
                            task_source.fallback_fields(),
                        )
                    }
                }
            });
            handles.push((source.clone(), handle));
        }

        let mut snapshot = Snapshot::new(started_at);
        for (source, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                // A panicking adapter must not take the cycle down either
                Err(e) => {
                    log::error!("❌ {} fetch task panicked: {}", source.name(), e);
                    SourceResult::fallback(source.fallback_score(), source.fallback_fields())
                }
            };
            snapshot.sources.insert(source.name().to_string(), result);
        }

        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(snapshot.clone());
        }
        snapshot
    }

    /// Most recent successfully produced snapshot, if any cycle has run.
    pub fn latest_snapshot(&self) -> Option<Snapshot> {
        self.latest.lock().ok().and_then(|guard| guard.clone())
    }
}
