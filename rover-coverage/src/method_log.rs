//! Coverage from a line-oriented method-hit log stream.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::sample_log::SampleLog;
use crate::window::GrowthWindow;
use crate::{CoverageError, CoverageMonitor};

/// Default growth window for method-log coverage.
pub const METHOD_LOG_WINDOW: usize = 80;
const MIN_GROWTH_RATE: f64 = 0.05;
const FACTOR: f64 = 0.5;

#[derive(Default)]
struct MethodCounter {
    seen: HashSet<String>,
}

/// Tails an instrumentation log, deduplicates `METHOD=<id>` entries and
/// reports `100 * unique / total` as the coverage percentage.
///
/// The stream is read by a background task; sampling happens on the
/// caller's schedule via [`CoverageMonitor::update`].
pub struct MethodLogMonitor {
    tag: String,
    total: u64,
    counter: Arc<Mutex<MethodCounter>>,
    window: GrowthWindow,
    last_count: u64,
    log: SampleLog,
    reader: tokio::task::JoinHandle<()>,
}

impl MethodLogMonitor {
    /// Start tailing `source`. `total` is the method-count denominator
    /// from the instrumentation step.
    pub fn spawn<R>(
        source: R,
        tag: impl Into<String>,
        total: u64,
        output_dir: Option<&Path>,
    ) -> Result<MethodLogMonitor, CoverageError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self::spawn_with_window(source, tag, total, output_dir, METHOD_LOG_WINDOW)
    }

    pub fn spawn_with_window<R>(
        source: R,
        tag: impl Into<String>,
        total: u64,
        output_dir: Option<&Path>,
        window_size: usize,
    ) -> Result<MethodLogMonitor, CoverageError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let tag = tag.into();
        let counter = Arc::new(Mutex::new(MethodCounter::default()));
        let log = SampleLog::create(output_dir)?;
        info!("method-log coverage: total methods {total}, tag {tag}");

        let reader = tokio::spawn(read_loop(source, Arc::clone(&counter)));

        Ok(MethodLogMonitor {
            tag,
            total: total.max(1),
            counter,
            window: GrowthWindow::new(window_size, MIN_GROWTH_RATE, FACTOR),
            last_count: 1,
            log,
            reader,
        })
    }

    fn unique_methods(&self) -> u64 {
        let counter = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        // a floor of one keeps the growth-rate quotients defined
        (counter.seen.len() as u64).max(1)
    }
}

async fn read_loop<R>(source: R, counter: Arc<Mutex<MethodCounter>>)
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let Ok(pattern) = Regex::new(r"METHOD=(\S+)") else {
        return;
    };
    let mut lines = source.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(captures) = pattern.captures(&line) {
                    let mut counter = counter.lock().unwrap_or_else(|e| e.into_inner());
                    counter.seen.insert(captures[1].to_string());
                }
            }
            Ok(None) => {
                warn!("coverage log stream ended");
                return;
            }
            Err(e) => {
                warn!("coverage log stream error: {e}");
                return;
            }
        }
    }
}

impl CoverageMonitor for MethodLogMonitor {
    fn update(&mut self) -> Result<f64, CoverageError> {
        let count = self.unique_methods();
        let percentage = 100.0 * count as f64 / self.total as f64;
        let rate = (count as f64 - self.last_count as f64) / self.last_count as f64;
        self.last_count = count;
        self.window.push(percentage);

        let line = format!(
            "[{}] {percentage:8.5}% ({count}/{}) --> {rate:8.5}",
            self.tag, self.total
        );
        info!("{line}");
        self.log.append(&line)?;
        Ok(percentage)
    }

    fn check_low_growth_rate(&mut self) -> bool {
        self.window.is_stalled()
    }

    fn clear(&mut self) {
        self.window.clear();
    }
}

impl Drop for MethodLogMonitor {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
