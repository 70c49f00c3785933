//! Command-line interface for cloud-data-sync.

pub mod args;
mod commands;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use args::{GlobalArgs, OutputSink};
pub use commands::{copy::CopyArgs, show_config::ShowConfigArgs, sync::SyncArgs};

/// Log filter used when RUST_LOG is not set.
const DEFAULT_LOG_FILTER: &str = "cloud_data_sync=info";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during CLI execution.
#[derive(Debug, Error)]
pub enum CliError {
    /// Argument processing error.
    #[error("{0}")]
    Args(#[from] args::ArgsError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] crate::config::ConfigError),

    /// Sync error.
    #[error("{0}")]
    Sync(#[from] crate::sync::SyncError),

    /// Local copy error.
    #[error("{0}")]
    Copy(#[from] crate::util::CopyError),
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

// =============================================================================
// CLI Definition
// =============================================================================

/// cds - Sync cloud object storage or a shared filesystem into a local directory.
#[derive(Parser, Debug)]
#[command(name = "cds", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sync the configured source into the destination directory.
    Sync(SyncArgs),

    /// Copy a local directory tree.
    Copy(CopyArgs),

    /// Print the resolved sync request as JSON.
    #[command(name = "show-config")]
    ShowConfig(ShowConfigArgs),
}

// =============================================================================
// CLI Execution
// =============================================================================

impl Cli {
    /// Parse command-line arguments and return the CLI instance.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Sync(args) => args.run(&self.global).await,
            Command::Copy(args) => args.run(&self.global).await,
            Command::ShowConfig(args) => args.run(&self.global).await,
        }
    }
}

/// Send logs to stderr, filtered by RUST_LOG.
pub fn init_logging() {
    // Ignore the error: a subscriber may already be installed
    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Main entry point for the CLI.
pub async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging();
    cli.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsStr;
    use std::path::PathBuf;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from([
            "cds",
            "sync",
            "--config-file",
            "/etc/cds.toml",
            "--page-size",
            "100",
            "--timeout-secs",
            "30",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.global.config_file, Some(PathBuf::from("/etc/cds.toml")));
        assert!(cli.global.json);
        match cli.command {
            Command::Sync(args) => {
                assert_eq!(args.page_size, Some(100));
                assert_eq!(args.timeout_secs, Some(30));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_copy() {
        let cli = Cli::try_parse_from(["cds", "copy", "/mnt/a", "/mnt/b"]).unwrap();
        match cli.command {
            Command::Copy(args) => {
                assert_eq!(args.src, PathBuf::from("/mnt/a"));
                assert_eq!(args.dst, PathBuf::from("/mnt/b"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_from_env_conflicts_with_config_file() {
        let result = Cli::try_parse_from([
            "cds",
            "show-config",
            "--from-env",
            "--config-file",
            "/etc/cds.toml",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_copy_command_runs() {
        let temp = tempfile::TempDir::new().unwrap();
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("sub/a.txt"), "a").unwrap();
        let dst = temp.path().join("dst");
        let report = temp.path().join("report.json");

        let cli = Cli::try_parse_from([
            OsStr::new("cds"),
            OsStr::new("copy"),
            src.as_os_str(),
            dst.as_os_str(),
            OsStr::new("--json"),
            OsStr::new("--output-file"),
            report.as_os_str(),
        ])
        .unwrap();
        cli.run().await.unwrap();

        assert_eq!(std::fs::read_to_string(dst.join("sub/a.txt")).unwrap(), "a");
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(value["files_copied"], 1);
    }
}
