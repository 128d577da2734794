//! Coverage monitors: the signal that decides when free exploration has
//! stopped paying off.
//!
//! Three interchangeable implementations sit behind [`CoverageMonitor`]:
//! a method-log tail ([`MethodLogMonitor`]), a probe over accumulated
//! execution data ([`ExecDataMonitor`]), and a plain timer
//! ([`IntervalMonitor`]). The first two share the adaptive growth-rate
//! window of [`GrowthWindow`].

mod exec_data;
mod interval;
mod method_log;
mod sample_log;
mod window;

pub use exec_data::{CoverageProbe, ExecDataMonitor};
pub use interval::IntervalMonitor;
pub use method_log::MethodLogMonitor;
pub use window::GrowthWindow;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("coverage probe failed: {0}")]
    Probe(String),
}

/// The coverage capability the exploration controller is polymorphic
/// over: sample, ask whether growth has stalled, forget the window.
pub trait CoverageMonitor: Send {
    /// Sample the current coverage value (a percentage in `[0, 100]`),
    /// feed it to the stall detector and persist it.
    fn update(&mut self) -> Result<f64, CoverageError>;

    /// True when the recent samples say exploration has flattened out.
    fn check_low_growth_rate(&mut self) -> bool;

    /// Forget the accumulated window (and rearm deadlines).
    fn clear(&mut self);
}
