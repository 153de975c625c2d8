//! Bounded rolling score history per source

use std::collections::VecDeque;

/// Number of scores retained per series. At a 30s cycle this is one hour
/// of history (120 readings).
pub const HISTORY_LENGTH: usize = 120;

/// FIFO window of the most recent scores for one source.
///
/// Created lazily on the first score observed for a source and kept for the
/// process lifetime. Oldest entry is evicted once the window is full.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    window: VecDeque<f64>,
    capacity: usize,
}

impl MetricSeries {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_LENGTH)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a score, evicting the oldest entry on overflow.
    pub fn push(&mut self, score: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(score);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.window.iter().sum::<f64>() / self.window.len() as f64)
    }

    /// Sample standard deviation. Requires at least 2 points; below that the
    /// series counts as insufficient data, never as a zero-variance signal.
    pub fn stddev(&self) -> Option<f64> {
        let n = self.window.len();
        if n < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = self
            .window
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        Some(variance.sqrt())
    }

    /// Mean and stdev together, only once enough history has accumulated
    /// to make the baseline meaningful (> 10 points).
    pub fn baseline(&self) -> Option<(f64, f64)> {
        if self.window.len() <= 10 {
            return None;
        }
        Some((self.mean()?, self.stddev()?))
    }
}

impl Default for MetricSeries {
    fn default() -> Self {
        Self::new()
    }
}
