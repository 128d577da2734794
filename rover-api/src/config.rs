//! Runtime configuration, read once at startup from a JSON file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing config key: {0}")]
    Missing(&'static str),
}

/// Which coverage monitor implementation drives mode switching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum CoverageMode {
    #[default]
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "method-log")]
    MethodLog,
    #[serde(rename = "bytecode")]
    Bytecode,
}

/// Engine configuration. Key spellings match the on-disk JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Human-readable app name, seeds every prompt.
    #[serde(rename = "AppName")]
    pub app_name: String,

    /// Short description of the app under test, seeds every prompt.
    #[serde(rename = "Description", default)]
    pub description: String,

    /// Package name of the app under test.
    #[serde(rename = "Package")]
    pub package: String,

    /// LLM provider credentials.
    #[serde(rename = "ApiKey", default)]
    pub api_key: String,

    /// Log tag marking coverage entries (method-log mode).
    #[serde(rename = "Tag", default)]
    pub tag: String,

    /// Total method count, the coverage denominator (method-log mode).
    #[serde(rename = "TotalMethod", default)]
    pub total_method: u64,

    /// Accumulated execution-data file (bytecode mode).
    #[serde(rename = "EcFilePath", default)]
    pub ec_file_path: String,

    /// Compiled class directory (bytecode mode).
    #[serde(rename = "ClassFilePath", default)]
    pub class_file_path: String,

    #[serde(rename = "CoverageMode", default)]
    pub coverage_mode: CoverageMode,

    /// Where reports, snapshots and transcripts are written.
    #[serde(rename = "OutputDir", default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the selected coverage mode has its inputs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.coverage_mode {
            CoverageMode::MethodLog => {
                if self.tag.is_empty() {
                    return Err(ConfigError::Missing("Tag"));
                }
                if self.total_method == 0 {
                    return Err(ConfigError::Missing("TotalMethod"));
                }
            }
            CoverageMode::Bytecode => {
                if self.ec_file_path.is_empty() {
                    return Err(ConfigError::Missing("EcFilePath"));
                }
                if self.class_file_path.is_empty() {
                    return Err(ConfigError::Missing("ClassFilePath"));
                }
            }
            CoverageMode::Time => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Config {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_minimal_config() {
        let config = parse(r#"{"AppName": "Demo", "Package": "com.example.demo"}"#);
        assert_eq!(config.app_name, "Demo");
        assert_eq!(config.coverage_mode, CoverageMode::Time);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_method_log_requires_tag_and_total() {
        let config = parse(
            r#"{"AppName": "Demo", "Package": "com.example.demo",
                "CoverageMode": "method-log", "TotalMethod": 100}"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Missing("Tag"))));

        let config = parse(
            r#"{"AppName": "Demo", "Package": "com.example.demo",
                "CoverageMode": "method-log", "Tag": "COV_LOG"}"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Missing("TotalMethod"))));
    }

    #[test]
    fn test_bytecode_requires_paths() {
        let config = parse(
            r#"{"AppName": "Demo", "Package": "com.example.demo",
                "CoverageMode": "bytecode", "EcFilePath": "/tmp/a.ec"}"#,
        );
        assert!(matches!(config.validate(), Err(ConfigError::Missing("ClassFilePath"))));
    }
}
