//! Broadcast fan-out - per-cycle delivery to live subscribers
//!
//! Subscribers are bounded mpsc channels keyed by a numeric id. Each cycle the
//! broadcaster copies the live set, delivers to every entry, and prunes the
//! ones whose receiver has gone away - after the full iteration, never
//! mid-iteration.
//!
//! A subscriber that is merely slow (its buffer is full) loses that one
//! payload but stays registered; only a closed channel gets pruned. Delivery
//! order across subscribers is unspecified, but each individual subscriber
//! sees payloads in cycle order.

use crate::predictor::{AccuracyStats, Prediction};
use crate::snapshot::Snapshot;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

pub type SubscriberId = u64;

/// What every subscriber receives each cycle: the snapshot enriched with the
/// engine's active predictions and accuracy stats.
#[derive(Debug, Clone, Serialize)]
pub struct CyclePayload {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub predictions: Vec<Prediction>,
    pub stats: StatsView,
}

/// Wire-facing accuracy block with the derived percentage materialized.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsView {
    pub accuracy_percent: f64,
    pub correct_count: u64,
    pub validated_count: u64,
}

impl From<AccuracyStats> for StatsView {
    fn from(stats: AccuracyStats) -> Self {
        Self {
            accuracy_percent: stats.accuracy_percent(),
            correct_count: stats.total_correct,
            validated_count: stats.total_validated,
        }
    }
}

struct Registry {
    next_id: SubscriberId,
    subscribers: Vec<(SubscriberId, mpsc::Sender<Arc<CyclePayload>>)>,
}

pub struct Broadcaster {
    registry: Mutex<Registry>,
    channel_buffer: usize,
}

impl Broadcaster {
    pub fn new(channel_buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry {
                next_id: 0,
                subscribers: Vec::new(),
            }),
            channel_buffer,
        }
    }

    /// Register a new subscriber. When `initial` carries the cached payload
    /// from a previous cycle it is delivered immediately, so late joiners do
    /// not wait a full cycle for first data.
    pub fn subscribe(
        &self,
        initial: Option<Arc<CyclePayload>>,
    ) -> (SubscriberId, mpsc::Receiver<Arc<CyclePayload>>) {
        let (tx, rx) = mpsc::channel(self.channel_buffer);

        if let Some(payload) = initial {
            // Freshly created channel, buffer >= 1: cannot fail
            let _ = tx.try_send(payload);
        }

        let id = {
            let mut registry = self.registry.lock().expect("subscriber registry poisoned");
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.push((id, tx));
            id
        };

        log::info!("✅ Subscriber {} connected (total: {})", id, self.subscriber_count());
        (id, rx)
    }

    /// Remove a subscriber. Safe to call twice.
    pub fn unsubscribe(&self, id: SubscriberId) {
        let mut registry = self.registry.lock().expect("subscriber registry poisoned");
        let before = registry.subscribers.len();
        registry.subscribers.retain(|(sub_id, _)| *sub_id != id);
        if registry.subscribers.len() < before {
            log::info!(
                "❌ Subscriber {} disconnected (total: {})",
                id,
                registry.subscribers.len()
            );
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .lock()
            .map(|r| r.subscribers.len())
            .unwrap_or(0)
    }

    /// Deliver a payload to every live subscriber, pruning dead ones.
    ///
    /// The subscriber list is copied before iterating so registration and
    /// removal can proceed concurrently with an in-progress broadcast.
    pub fn broadcast(&self, payload: Arc<CyclePayload>) {
        let live: Vec<(SubscriberId, mpsc::Sender<Arc<CyclePayload>>)> = {
            let registry = self.registry.lock().expect("subscriber registry poisoned");
            registry.subscribers.clone()
        };

        if live.is_empty() {
            return;
        }

        let mut dead = Vec::new();
        for (id, tx) in &live {
            match tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    // Slow consumer: drop this payload, keep the subscriber
                    log::warn!("⚠️  Subscriber {} is lagging, dropping payload", id);
                }
                Err(TrySendError::Closed(_)) => {
                    dead.push(*id);
                }
            }
        }

        // Prune only after the full iteration
        if !dead.is_empty() {
            let mut registry = self.registry.lock().expect("subscriber registry poisoned");
            registry
                .subscribers
                .retain(|(id, _)| !dead.contains(id));
            log::info!(
                "🧹 Pruned {} dead subscriber(s) (total: {})",
                dead.len(),
                registry.subscribers.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Snapshot;
    use chrono::Utc;

    fn make_payload() -> Arc<CyclePayload> {
        Arc::new(CyclePayload {
            snapshot: Snapshot::new(Utc::now()),
            predictions: Vec::new(),
            stats: AccuracyStats::default().into(),
        })
    }

    #[tokio::test]
    async fn test_subscriber_before_first_cycle_receives_nothing() {
        let broadcaster = Broadcaster::new(8);
        let (_id, mut rx) = broadcaster.subscribe(None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_cached_payload_immediately() {
        let broadcaster = Broadcaster::new(8);
        let cached = make_payload();
        let (_id, mut rx) = broadcaster.subscribe(Some(cached.clone()));

        let received = rx.try_recv().expect("initial payload delivered");
        assert_eq!(received.snapshot.timestamp, cached.snapshot.timestamp);
    }

    #[tokio::test]
    async fn test_broken_subscriber_pruned_after_iteration() {
        let broadcaster = Broadcaster::new(8);
        let (_a, mut rx_a) = broadcaster.subscribe(None);
        let (_b, rx_b) = broadcaster.subscribe(None);
        let (_c, mut rx_c) = broadcaster.subscribe(None);

        // One of three subscribers goes away
        drop(rx_b);
        broadcaster.broadcast(make_payload());

        assert_eq!(broadcaster.subscriber_count(), 2);
        // The healthy two still got the payload; the cycle was not aborted
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_c.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let broadcaster = Broadcaster::new(8);
        let (id, _rx) = broadcaster.subscribe(None);
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.unsubscribe(id);
        broadcaster.unsubscribe(id);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_per_subscriber_delivery_in_cycle_order() {
        let broadcaster = Broadcaster::new(8);
        let (_id, mut rx) = broadcaster.subscribe(None);

        let first = make_payload();
        let second = make_payload();
        broadcaster.broadcast(first.clone());
        broadcaster.broadcast(second.clone());

        assert_eq!(
            rx.try_recv().unwrap().snapshot.timestamp,
            first.snapshot.timestamp
        );
        assert_eq!(
            rx.try_recv().unwrap().snapshot.timestamp,
            second.snapshot.timestamp
        );
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_payload_but_stays() {
        let broadcaster = Broadcaster::new(1);
        let (_id, mut rx) = broadcaster.subscribe(None);

        broadcaster.broadcast(make_payload());
        broadcaster.broadcast(make_payload());

        // Still registered despite the full buffer
        assert_eq!(broadcaster.subscriber_count(), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
