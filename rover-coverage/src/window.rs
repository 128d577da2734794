//! Adaptive growth-rate window shared by the coverage monitors.

use std::collections::VecDeque;

use tracing::debug;

/// Hard floor for the adaptive threshold.
const MIN_THRESHOLD: f64 = 0.01;
/// Single growth-rate samples above this are clamped before summation.
const GROWTH_CLAMP: f64 = 10.0;

/// Rolling window of coverage growth rates with a self-adjusting stall
/// threshold.
///
/// For samples `x1..xn` the growth rate is `gn = (xn - xn-1) / xn-1`.
/// Once `n` reaches the window size, the threshold follows
/// `Tn = max(T_min, Tn-1 * exp(k * (gn - G)))` where `G` is the clamped
/// mean growth over the whole history. Growth has stalled when the
/// window is full and every sample in it is at or below the threshold.
#[derive(Debug)]
pub struct GrowthWindow {
    window_size: usize,
    factor: f64,
    threshold: f64,
    history_len: usize,
    last_value: Option<f64>,
    growth_sum: f64,
    window: VecDeque<f64>,
}

impl GrowthWindow {
    pub fn new(window_size: usize, min_growth_rate: f64, factor: f64) -> GrowthWindow {
        GrowthWindow {
            window_size,
            factor,
            threshold: min_growth_rate,
            history_len: 0,
            last_value: None,
            growth_sum: 0.0,
            window: VecDeque::with_capacity(window_size + 1),
        }
    }

    /// Feed the next coverage sample.
    pub fn push(&mut self, value: f64) {
        self.history_len += 1;
        let mut growth = 0.0;
        if let Some(last) = self.last_value {
            if last != 0.0 {
                growth = (value - last) / last;
            }
            self.growth_sum += growth.min(GROWTH_CLAMP);
            self.window.push_back(growth);
            if self.window.len() > self.window_size {
                self.window.pop_front();
            }
            debug!(
                "coverage growth rate ({}/{}): {growth:.5}, sum {:.5}",
                self.window.len(),
                self.window_size,
                self.growth_sum
            );
        }
        self.last_value = Some(value);

        if self.history_len >= self.window_size {
            let baseline = self.growth_sum / (self.history_len - 1) as f64;
            let delta = growth - baseline;
            self.threshold = (self.threshold * (self.factor * delta).exp()).max(MIN_THRESHOLD);
            debug!(
                "coverage baseline {baseline:.5}, delta {delta:.5}, threshold {:.5}",
                self.threshold
            );
        }
    }

    /// True once the window is full and every sample in it sits at or
    /// below the adaptive threshold.
    pub fn is_stalled(&self) -> bool {
        if self.window.len() < self.window_size {
            return false;
        }
        for (i, growth) in self.window.iter().rev().enumerate() {
            if *growth > self.threshold {
                debug!("growth window not stalled: sample {i} from the end is above threshold");
                return false;
            }
        }
        true
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Forget the windowed samples. History length, threshold and the
    /// running sum survive, so the detector stays adapted.
    pub fn clear(&mut self) {
        self.window.clear();
    }
}
