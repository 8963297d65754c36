//! Trailing-window velocity estimation from pointer samples.

use std::collections::VecDeque;

/// Estimates instantaneous velocity (offset-days per second) from a
/// trailing window of `(t_ms, offset_days)` samples via a least-squares
/// fit, falling back to a first-to-last slope when only two samples remain.
/// Samples older than `window_ms` relative to the latest one are dropped.
pub struct VelocityEstimator {
    samples: VecDeque<(i64, f64)>,
    window_ms: i64,
}

impl VelocityEstimator {
    pub fn new(window_ms: i64) -> Self {
        Self {
            samples: VecDeque::new(),
            window_ms,
        }
    }

    pub fn push(&mut self, t_ms: i64, offset_days: f64) {
        self.samples.push_back((t_ms, offset_days));
        while let Some(&(oldest_t, _)) = self.samples.front() {
            if t_ms - oldest_t > self.window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Days/second. Zero if fewer than two samples remain in the window.
    pub fn estimate(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }

        let n = self.samples.len() as f64;
        let t_mean = self.samples.iter().map(|&(t, _)| t as f64).sum::<f64>() / n;
        let x_mean = self.samples.iter().map(|&(_, x)| x).sum::<f64>() / n;

        let mut num = 0.0;
        let mut den = 0.0;
        for &(t, x) in &self.samples {
            let dt = t as f64 - t_mean;
            num += dt * (x - x_mean);
            den += dt * dt;
        }

        if den.abs() < f64::EPSILON {
            let (t0, x0) = self.samples.front().copied().unwrap();
            let (t1, x1) = self.samples.back().copied().unwrap();
            if t1 == t0 {
                return 0.0;
            }
            return (x1 - x0) / ((t1 - t0) as f64 / 1000.0);
        }

        // Slope is in days per millisecond; convert to days per second.
        (num / den) * 1000.0
    }
}
