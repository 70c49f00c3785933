//! Sync CLI command.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tracing::warn;

use crate::cli::{GlobalArgs, OutputSink, Result};
use crate::config::read_config;
use crate::sync::{SyncOptions, SyncReport, run_config};

/// Arguments for the sync command.
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Directory under which the staging directory is created.
    #[arg(long = "staging-dir")]
    pub staging_dir: Option<PathBuf>,

    /// Keys requested per listing page (1-1000).
    #[arg(long = "page-size")]
    pub page_size: Option<i32>,

    /// Deadline in seconds for each listing request and object download.
    /// 0 disables the deadline.
    #[arg(long = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    #[command(flatten)]
    pub output: OutputSink,
}

#[derive(Serialize)]
struct SyncOutput {
    status: &'static str,
    #[serde(flatten)]
    report: SyncReport,
}

impl fmt::Display for SyncOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = &self.report;
        match (&report.backend, &report.destination) {
            (Some(backend), Some(destination)) if !report.skipped => write!(
                f,
                "synced {} object(s), {} byte(s) from {} into {} ({} file(s) copied)",
                report.objects_downloaded,
                report.bytes_downloaded,
                backend,
                destination.display(),
                report.files_copied
            ),
            _ => write!(f, "nothing to sync: no known platform configured"),
        }
    }
}

impl SyncArgs {
    /// Layer command-line overrides over the configured sync settings.
    pub fn options(&self, base: SyncOptions) -> SyncOptions {
        let mut options = base;
        if let Some(page_size) = self.page_size {
            options = options.with_page_size(page_size);
        }
        if let Some(secs) = self.timeout_secs {
            options = options.with_request_timeout(Some(Duration::from_secs(secs)));
        }
        if let Some(dir) = &self.staging_dir {
            options = options.with_staging_root(dir);
        }
        options
    }

    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let loaded = read_config(&global.to_config_source())?;
        if let Some(warning) = &loaded.warning {
            warn!("{}", warning);
        }

        let options = self.options(SyncOptions::from_settings(&loaded.config.sync));
        let report = run_config(&loaded.config, &options).await?;

        let output = SyncOutput {
            status: if report.skipped { "skipped" } else { "synced" },
            report,
        };
        self.output.write(&output, global.json).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_settings() {
        let args = SyncArgs {
            staging_dir: Some(PathBuf::from("/scratch")),
            page_size: Some(20_000),
            timeout_secs: Some(0),
            ..SyncArgs::default()
        };
        let base = SyncOptions::default().with_request_timeout(Some(Duration::from_secs(9)));

        let options = args.options(base);
        assert_eq!(options.page_size, 1000);
        assert_eq!(options.request_timeout, None);
        assert_eq!(options.staging_root, Some(PathBuf::from("/scratch")));
    }

    #[test]
    fn test_no_overrides_keep_settings() {
        let base = SyncOptions::default()
            .with_page_size(50)
            .with_request_timeout(Some(Duration::from_secs(9)));

        assert_eq!(SyncArgs::default().options(base.clone()), base);
    }

    #[test]
    fn test_skipped_output() {
        let output = SyncOutput {
            status: "skipped",
            report: SyncReport::skipped(),
        };
        assert!(output.to_string().starts_with("nothing to sync"));

        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["status"], "skipped");
        assert_eq!(value["skipped"], true);
    }
}
