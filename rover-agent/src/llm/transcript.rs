//! On-disk record of every model interaction.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

/// Appends prompts/responses to `qa-transcript.txt` and per-round-trip
/// timings to `llm-latency.csv`. Without an output directory both sinks
/// are disabled.
pub(crate) struct Transcript {
    qa: Option<std::fs::File>,
    latency: Option<std::fs::File>,
}

impl Transcript {
    pub(crate) fn create(output_dir: Option<&Path>, package: &str) -> std::io::Result<Transcript> {
        let Some(dir) = output_dir else {
            return Ok(Transcript { qa: None, latency: None });
        };
        std::fs::create_dir_all(dir)?;

        let mut qa = std::fs::File::create(dir.join("qa-transcript.txt"))?;
        writeln!(qa, "package: {package}")?;
        writeln!(qa, "{}", "=".repeat(20))?;

        let mut latency = std::fs::File::create(dir.join("llm-latency.csv"))?;
        writeln!(latency, "elapsed_secs,response_len")?;

        Ok(Transcript {
            qa: Some(qa),
            latency: Some(latency),
        })
    }

    /// Append a titled block (a prompt or a response) to the transcript.
    pub(crate) fn record(&mut self, title: &str, content: &str) {
        if let Some(file) = &mut self.qa {
            let result = writeln!(file, "==== {title} ====\n{content}");
            if let Err(e) = result {
                warn!("failed to append to qa transcript: {e}");
            }
        }
    }

    pub(crate) fn record_latency(&mut self, elapsed: Duration, response_len: usize) {
        if let Some(file) = &mut self.latency {
            let result = writeln!(file, "{:.5},{response_len}", elapsed.as_secs_f64());
            if let Err(e) = result {
                warn!("failed to append to latency log: {e}");
            }
        }
    }
}
