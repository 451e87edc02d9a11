use std::collections::VecDeque;
use std::time::Duration;

/// Batches kept in the rolling average
const WINDOW: usize = 5;

/// Projects the remaining time of a job from its most recent batches
#[derive(Debug, Clone)]
pub struct ProgressEstimator {
    total: usize,
    batch_size: usize,
    recent: VecDeque<Duration>,
}

impl ProgressEstimator {
    pub fn new(total: usize, batch_size: usize) -> Self {
        Self {
            total,
            batch_size: batch_size.max(1),
            recent: VecDeque::with_capacity(WINDOW),
        }
    }

    /// Record one batch, translation and pause included
    pub fn record(&mut self, elapsed: Duration) {
        if self.recent.len() == WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(elapsed);
    }

    pub fn percent(&self, done: usize) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        done.min(self.total) as f64 * 100.0 / self.total as f64
    }

    /// Estimated time left once `done` cues are translated; `None` before the
    /// first batch completes
    pub fn remaining(&self, done: usize) -> Option<Duration> {
        if self.recent.is_empty() {
            return None;
        }

        let average = self.recent.iter().sum::<Duration>() / self.recent.len() as u32;
        let batches_left = self.total.saturating_sub(done).div_ceil(self.batch_size);
        Some(average * batches_left as u32)
    }
}
