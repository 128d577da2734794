//! Coverage from an execution-data probe with a wall-clock budget.

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, warn};

use crate::sample_log::SampleLog;
use crate::window::GrowthWindow;
use crate::{CoverageError, CoverageMonitor};

/// Default growth window for exec-data coverage.
pub const EXEC_DATA_WINDOW: usize = 60;
/// How long one probe invocation may take before the previous value is
/// reused.
pub const PROBE_BUDGET: Duration = Duration::from_millis(1300);
const MIN_GROWTH_RATE: f64 = 0.05;
const FACTOR: f64 = 0.5;

/// Computes a coverage percentage from accumulated execution data (an
/// exec-data file plus a class directory, or whatever the embedder
/// wired up). Invoked synchronously once per sample.
pub trait CoverageProbe: Send + Sync {
    fn compute(&self) -> Result<f64, CoverageError>;
}

/// Samples a [`CoverageProbe`] under a fixed wall-clock budget.
///
/// The probe runs on a throwaway thread; when it overruns the budget the
/// previous value is reused and the straggler still lands its result for
/// the next round.
pub struct ExecDataMonitor {
    probe: Arc<dyn CoverageProbe>,
    budget: Duration,
    latest: Arc<Mutex<f64>>,
    window: GrowthWindow,
    log: SampleLog,
}

impl ExecDataMonitor {
    pub fn new(
        probe: Arc<dyn CoverageProbe>,
        output_dir: Option<&Path>,
    ) -> Result<ExecDataMonitor, CoverageError> {
        Self::with_window(probe, output_dir, EXEC_DATA_WINDOW)
    }

    pub fn with_window(
        probe: Arc<dyn CoverageProbe>,
        output_dir: Option<&Path>,
        window_size: usize,
    ) -> Result<ExecDataMonitor, CoverageError> {
        Ok(ExecDataMonitor {
            probe,
            budget: PROBE_BUDGET,
            latest: Arc::new(Mutex::new(0.00001)),
            window: GrowthWindow::new(window_size, MIN_GROWTH_RATE, FACTOR),
            log: SampleLog::create(output_dir)?,
        })
    }

    #[cfg(test)]
    fn with_budget(mut self, budget: Duration) -> ExecDataMonitor {
        self.budget = budget;
        self
    }
}

impl CoverageMonitor for ExecDataMonitor {
    fn update(&mut self) -> Result<f64, CoverageError> {
        let (done_tx, done_rx) = mpsc::channel();
        let probe = Arc::clone(&self.probe);
        let latest = Arc::clone(&self.latest);
        std::thread::spawn(move || {
            match probe.compute() {
                Ok(value) => {
                    *latest.lock().unwrap_or_else(|e| e.into_inner()) = value;
                }
                Err(e) => warn!("coverage probe failed: {e}"),
            }
            let _ = done_tx.send(());
        });

        if done_rx.recv_timeout(self.budget).is_err() {
            info!("coverage probe overran its budget, reusing the previous value");
        }

        let value = *self.latest.lock().unwrap_or_else(|e| e.into_inner());
        self.window.push(value);
        self.log.append(&format!("{value:.5}%"))?;
        Ok(value)
    }

    fn check_low_growth_rate(&mut self) -> bool {
        self.window.is_stalled()
    }

    fn clear(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProbe {
        values: Vec<f64>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CoverageProbe for ScriptedProbe {
        fn compute(&self) -> Result<f64, CoverageError> {
            std::thread::sleep(self.delay);
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.values[call.min(self.values.len() - 1)])
        }
    }

    #[test]
    fn test_probe_values_flow_through() {
        let probe = Arc::new(ScriptedProbe {
            values: vec![10.0, 20.0],
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        });
        let mut monitor = ExecDataMonitor::with_window(probe, None, 2).unwrap();
        assert!((monitor.update().unwrap() - 10.0).abs() < 1e-9);
        assert!((monitor.update().unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_slow_probe_reuses_previous_value() {
        let probe = Arc::new(ScriptedProbe {
            values: vec![10.0, 99.0],
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(80),
        });
        let mut monitor = ExecDataMonitor::with_window(probe, None, 2)
            .unwrap()
            .with_budget(Duration::from_millis(10));
        // first sample overruns: the seed value is reported
        let first = monitor.update().unwrap();
        assert!(first < 1.0, "first sample {first}");
        // once the straggler lands, its value shows up
        std::thread::sleep(Duration::from_millis(120));
        let second = monitor.update().unwrap();
        assert!((second - 10.0).abs() < 1e-9 || (second - 99.0).abs() < 1e-9);
    }
}
