//! Append-only coverage time series on disk.

use std::io::Write;
use std::path::Path;

/// Writer for `coverage.log`. Constructed without an output directory it
/// swallows every line, which keeps tests and dry runs quiet.
pub(crate) struct SampleLog {
    file: Option<std::fs::File>,
}

impl SampleLog {
    pub(crate) fn create(output_dir: Option<&Path>) -> std::io::Result<SampleLog> {
        let Some(dir) = output_dir else {
            return Ok(SampleLog { file: None });
        };
        std::fs::create_dir_all(dir)?;
        let mut file = std::fs::File::create(dir.join("coverage.log"))?;
        writeln!(file, "code coverage")?;
        writeln!(file, "start time: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))?;
        Ok(SampleLog { file: Some(file) })
    }

    pub(crate) fn append(&mut self, line: &str) -> std::io::Result<()> {
        if let Some(file) = &mut self.file {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }
}
