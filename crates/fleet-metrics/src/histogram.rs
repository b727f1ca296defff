// SPDX-License-Identifier: MIT

//! Bounded-memory histogram for latency/duration metrics (e.g. session
//! lifetime, §6).

use parking_lot::Mutex;
use serde::Serialize;

/// Ring-buffer histogram: keeps the last `capacity` samples and reports
/// count/sum/min/max/mean over them. Good enough for a pull-model snapshot
/// without pulling in a full t-digest dependency.
pub struct Histogram {
    capacity: usize,
    samples: Mutex<Vec<f64>>,
    next: Mutex<usize>,
    count_total: Mutex<u64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Histogram {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Mutex::new(Vec::new()),
            next: Mutex::new(0),
            count_total: Mutex::new(0),
        }
    }

    pub fn record(&self, value: f64) {
        let mut samples = self.samples.lock();
        let mut next = self.next.lock();
        if samples.len() < self.capacity {
            samples.push(value);
        } else {
            samples[*next] = value;
        }
        *next = (*next + 1) % self.capacity;
        *self.count_total.lock() += 1;
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return HistogramSnapshot::default();
        }
        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        HistogramSnapshot {
            count: *self.count_total.lock(),
            sum,
            min,
            max,
            mean: sum / samples.len() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_basic_stats() {
        let h = Histogram::new(10);
        h.record(10.0);
        h.record(20.0);
        h.record(30.0);
        let snap = h.snapshot();
        assert_eq!(snap.count, 3);
        assert_eq!(snap.min, 10.0);
        assert_eq!(snap.max, 30.0);
        assert_eq!(snap.mean, 20.0);
    }

    #[test]
    fn wraps_around_capacity_but_keeps_total_count() {
        let h = Histogram::new(2);
        h.record(1.0);
        h.record(2.0);
        h.record(3.0);
        let snap = h.snapshot();
        assert_eq!(snap.count, 3);
        // Ring buffer retains only the last 2 samples for the stat window.
        assert_eq!(snap.min, 2.0);
        assert_eq!(snap.max, 3.0);
    }
}
