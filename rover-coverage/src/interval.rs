//! Timer fallback for apps without any coverage instrumentation.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;

use crate::sample_log::SampleLog;
use crate::{CoverageError, CoverageMonitor};

/// Default spacing between guided phases.
pub const GUIDANCE_INTERVAL: Duration = Duration::from_secs(240);

/// Declares a "stall" whenever a fixed interval has elapsed, standing in
/// for a real coverage signal.
pub struct IntervalMonitor {
    interval: Duration,
    deadline: Instant,
    log: SampleLog,
}

impl IntervalMonitor {
    pub fn new(output_dir: Option<&Path>) -> Result<IntervalMonitor, CoverageError> {
        Self::with_interval(GUIDANCE_INTERVAL, output_dir)
    }

    pub fn with_interval(
        interval: Duration,
        output_dir: Option<&Path>,
    ) -> Result<IntervalMonitor, CoverageError> {
        Ok(IntervalMonitor {
            interval,
            deadline: Instant::now() + interval,
            log: SampleLog::create(output_dir)?,
        })
    }
}

impl CoverageMonitor for IntervalMonitor {
    fn update(&mut self) -> Result<f64, CoverageError> {
        // report how much of the current interval has been consumed
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let consumed = self.interval.saturating_sub(remaining);
        let percentage = (100.0 * consumed.as_secs_f64() / self.interval.as_secs_f64()).min(100.0);
        self.log.append(&format!("{percentage:.5}%"))?;
        Ok(percentage)
    }

    fn check_low_growth_rate(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            info!("guidance interval elapsed");
            true
        } else {
            info!("about {:.0}s left until guidance", (self.deadline - now).as_secs_f64());
            false
        }
    }

    fn clear(&mut self) {
        self.deadline = Instant::now() + self.interval;
    }
}
