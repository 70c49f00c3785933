//! Copy CLI command.

use std::fmt;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::cli::{GlobalArgs, OutputSink, Result};
use crate::util::{CopyStats, copy_dir};

/// Arguments for the copy command.
#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source directory.
    pub src: PathBuf,

    /// Destination directory, created if missing.
    pub dst: PathBuf,

    #[command(flatten)]
    pub output: OutputSink,
}

#[derive(Serialize)]
struct CopyOutput {
    src: PathBuf,
    dst: PathBuf,
    #[serde(flatten)]
    stats: CopyStats,
}

impl fmt::Display for CopyOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copied {} file(s), {} byte(s) from {} to {}",
            self.stats.files_copied,
            self.stats.bytes_copied,
            self.src.display(),
            self.dst.display()
        )
    }
}

impl CopyArgs {
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let stats = copy_dir(&self.src, &self.dst).await?;
        let output = CopyOutput {
            src: self.src,
            dst: self.dst,
            stats,
        };
        self.output.write(&output, global.json).await?;
        Ok(())
    }
}
