//! Process-wide tracing setup.

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Honors `RUST_LOG`, defaults to
/// `info`. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
