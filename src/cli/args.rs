//! Command-line argument definitions and helpers.

use std::fmt::Display;
use std::path::PathBuf;

use clap::Args;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::ConfigSource;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during argument processing.
#[derive(Debug, Error)]
pub enum ArgsError {
    /// I/O error writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for argument operations.
pub type Result<T> = std::result::Result<T, ArgsError>;

// =============================================================================
// Global Arguments
// =============================================================================

/// Global arguments that apply to all commands.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Path to the TOML configuration file. Defaults to $CDS_CONFIG_FILE,
    /// then to environment variables.
    #[arg(long = "config-file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Read configuration from environment variables only.
    #[arg(long = "from-env", global = true, conflicts_with = "config_file")]
    pub from_env: bool,

    /// Format output as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Convert to a ConfigSource for reading configuration.
    pub fn to_config_source(&self) -> ConfigSource {
        ConfigSource {
            config_file: self.config_file.clone(),
            from_env: self.from_env,
        }
    }
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Helper for commands that write output to a file or stdout.
#[derive(Args, Debug, Default)]
pub struct OutputSink {
    /// Write output to this file instead of stdout.
    #[arg(id = "output_file", short = 'o', long = "output-file")]
    pub file: Option<PathBuf>,
}

impl OutputSink {
    /// Write a string value to the output.
    pub async fn write_str(&self, value: &str) -> Result<()> {
        match &self.file {
            Some(path) => {
                tokio::fs::write(path, format!("{}\n", value)).await?;
            }
            None => {
                let mut stdout = tokio::io::stdout();
                stdout.write_all(value.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }
        Ok(())
    }

    /// Write a value as pretty JSON.
    pub async fn write_json<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        self.write_str(&serde_json::to_string_pretty(value)?).await
    }

    /// Write a value as JSON or through its Display impl.
    pub async fn write<T: serde::Serialize + Display>(&self, value: &T, json: bool) -> Result<()> {
        if json {
            self.write_json(value).await
        } else {
            self.write_str(&value.to_string()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(serde::Serialize)]
    struct Sample {
        files: u64,
    }

    impl Display for Sample {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{} file(s)", self.files)
        }
    }

    #[test]
    fn test_config_source_from_args() {
        let args = GlobalArgs {
            config_file: Some(PathBuf::from("/etc/cds.toml")),
            from_env: false,
            json: true,
        };
        let source = args.to_config_source();
        assert_eq!(source.config_file, Some(PathBuf::from("/etc/cds.toml")));
        assert!(!source.from_env);
    }

    #[tokio::test]
    async fn test_output_to_stdout() {
        let sink = OutputSink::default();
        sink.write(&Sample { files: 1 }, false).await.unwrap();
        sink.write_json(&Sample { files: 1 }).await.unwrap();
    }

    #[tokio::test]
    async fn test_output_file_formats() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");
        let sink = OutputSink {
            file: Some(path.clone()),
        };

        sink.write(&Sample { files: 3 }, false).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3 file(s)\n");

        sink.write(&Sample { files: 3 }, true).await.unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["files"], 3);
    }
}
