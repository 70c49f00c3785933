//! Recursive local directory copy.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

/// Errors that can occur while copying a directory tree.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("destination {dst} is inside source {src}")]
    DestinationInsideSource { src: PathBuf, dst: PathBuf },

    #[error("failed to copy {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CopyError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CopyError + '_ {
    move |source| CopyError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Counters for one copy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
    pub directories_created: u64,
}

/// Copy the contents of `src` into `dst`, creating `dst` if needed.
///
/// Entries are visited in name order. Files overwrite existing files at the
/// destination; symlinks are followed, except a symlinked directory that
/// points back at one of its own ancestors, which is skipped. The first error
/// aborts the copy and leaves whatever was already copied in place.
///
/// Nothing is created when `dst` lies inside `src`.
pub async fn copy_dir(src: &Path, dst: &Path) -> Result<CopyStats> {
    let metadata = fs::metadata(src).await.map_err(io_error(src))?;
    if !metadata.is_dir() {
        return Err(CopyError::NotADirectory(src.to_path_buf()));
    }

    let src_canonical = fs::canonicalize(src).await.map_err(io_error(src))?;
    let dst_canonical = canonicalize_missing(dst).await?;
    if dst_canonical.starts_with(&src_canonical) {
        return Err(CopyError::DestinationInsideSource {
            src: src.to_path_buf(),
            dst: dst.to_path_buf(),
        });
    }

    let mut stats = CopyStats::default();
    if !fs::try_exists(dst).await.map_err(io_error(dst))? {
        fs::create_dir_all(dst).await.map_err(io_error(dst))?;
        stats.directories_created += 1;
    }

    let mut ancestors = vec![src_canonical];
    copy_entries(src, dst, &mut ancestors, &mut stats).await?;

    debug!(
        src = %src.display(),
        dst = %dst.display(),
        files = stats.files_copied,
        "copied directory"
    );
    Ok(stats)
}

/// Canonical form of a path that may not exist yet: its nearest existing
/// ancestor is canonicalized and the missing components are appended.
async fn canonicalize_missing(path: &Path) -> Result<PathBuf> {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        match fs::canonicalize(existing).await {
            Ok(canonical) => {
                return Ok(missing
                    .iter()
                    .rev()
                    .fold(canonical, |path, name| path.join(name)));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name.to_os_string());
                        existing = if parent.as_os_str().is_empty() {
                            Path::new(".")
                        } else {
                            parent
                        };
                    }
                    _ => return Err(io_error(path)(e)),
                }
            }
            Err(e) => return Err(io_error(path)(e)),
        }
    }
}

/// Copy the entries of `src` into `dst`.
///
/// `ancestors` holds the canonical paths of the directories being copied,
/// outermost first.
async fn copy_entries(
    src: &Path,
    dst: &Path,
    ancestors: &mut Vec<PathBuf>,
    stats: &mut CopyStats,
) -> Result<()> {
    let mut entries = fs::read_dir(src).await.map_err(io_error(src))?;
    let mut sorted_entries = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(io_error(src))? {
        sorted_entries.push(entry);
    }
    sorted_entries.sort_by_key(|a| a.file_name());

    for entry in sorted_entries {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        // fs::metadata follows symlinks
        let metadata = fs::metadata(&src_path).await.map_err(io_error(&src_path))?;

        if metadata.is_dir() {
            let canonical = fs::canonicalize(&src_path)
                .await
                .map_err(io_error(&src_path))?;
            if ancestors.contains(&canonical) {
                warn!(path = %src_path.display(), "skipping symlink cycle");
                continue;
            }

            if !fs::try_exists(&dst_path).await.map_err(io_error(&dst_path))? {
                fs::create_dir(&dst_path).await.map_err(io_error(&dst_path))?;
                stats.directories_created += 1;
            }

            ancestors.push(canonical);
            let result = Box::pin(copy_entries(&src_path, &dst_path, ancestors, stats)).await;
            ancestors.pop();
            result?;
        } else {
            let bytes = fs::copy(&src_path, &dst_path)
                .await
                .map_err(io_error(&src_path))?;
            stats.files_copied += 1;
            stats.bytes_copied += bytes;
        }
    }

    Ok(())
}
