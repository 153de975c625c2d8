//! Cycle driver - the periodic loop that owns the pipeline
//!
//! A two-state machine (`running` / `stopped`): `run()` repeats
//! fetch -> engine -> broadcast at a fixed rest interval, sleeping the full
//! period after each cycle's work completes (cycle duration adds to the
//! interval). Any failure inside one cycle's body is logged and the loop
//! continues; only the cooperative stop flag, checked at the top of each
//! iteration, ends it. `stop()` never cancels an in-flight cycle.

use crate::pipeline::{CycleError, Pipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Handle for requesting a cooperative stop from outside the loop.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    /// Transition the driver to `stopped`. The loop observes this at the top
    /// of its next iteration and exits without starting a partial cycle.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

pub struct CycleDriver {
    pipeline: Arc<Pipeline>,
    update_interval: Duration,
    stopped: Arc<AtomicBool>,
}

impl CycleDriver {
    pub fn new(pipeline: Arc<Pipeline>, update_interval: Duration) -> Self {
        Self {
            pipeline,
            update_interval,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            stopped: self.stopped.clone(),
        }
    }

    /// Run until stopped. Independent of subscriber count: broadcasting is a
    /// side effect of the cycle, not a precondition for continuing.
    pub async fn run(self) {
        log::info!(
            "🔄 Starting data loop (updating every {}s)",
            self.update_interval.as_secs()
        );

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }

            if let Err(e) = self.run_one_cycle().await {
                log::error!("❌ Error in data loop: {}", e);
            }

            tokio::time::sleep(self.update_interval).await;
        }

        log::info!("👋 Data loop stopped");
    }

    /// One cycle, with panic containment: a panicking cycle body is reported
    /// as a `CycleError` instead of unwinding into the loop.
    async fn run_one_cycle(&self) -> Result<(), CycleError> {
        let pipeline = self.pipeline.clone();
        match tokio::spawn(async move { pipeline.run_cycle().await }).await {
            Ok(result) => result,
            Err(join_err) => Err(CycleError::Panicked(join_err.to_string())),
        }
    }
}
