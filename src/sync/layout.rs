//! Mapping of remote object keys onto a local directory tree.
//!
//! The mapping is pure; [`create_directories`] is the only function here
//! that touches the filesystem, and it only creates directories.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::object_store::KEY_SEPARATOR;

/// Errors produced while mapping keys to local paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid object key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

impl LayoutError {
    fn invalid(key: &str, reason: &str) -> Self {
        LayoutError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Where a remote object lands locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTarget {
    /// Download the object to this path.
    File(PathBuf),
    /// The object is a directory placeholder; make sure this directory exists.
    Directory(PathBuf),
}

impl LocalTarget {
    pub fn path(&self) -> &Path {
        match self {
            LocalTarget::File(p) | LocalTarget::Directory(p) => p,
        }
    }
}

/// Split a key fragment into path components.
///
/// Empty and `.` components are dropped; `..` rejects the key.
fn components<'a>(fragment: &'a str, key: &str) -> Result<Vec<&'a str>, LayoutError> {
    let mut parts = Vec::new();
    for part in fragment.split(KEY_SEPARATOR) {
        match part {
            "" | "." => continue,
            ".." => return Err(LayoutError::invalid(key, "contains a '..' component")),
            p if p.contains('\0') => {
                return Err(LayoutError::invalid(key, "contains a NUL byte"));
            }
            p => parts.push(p),
        }
    }
    Ok(parts)
}

/// Last path component of a key, ignoring a trailing separator.
pub fn base_name(key: &str) -> Result<&str, LayoutError> {
    components(key, key)?
        .pop()
        .ok_or_else(|| LayoutError::invalid(key, "has no file name"))
}

/// Map one key found under `prefix` to its local target under `base`.
///
/// Returns None when the key is the prefix's own directory placeholder.
pub fn local_target(
    key: &str,
    prefix: &str,
    base: &Path,
) -> Result<Option<LocalTarget>, LayoutError> {
    let relative = key
        .strip_prefix(prefix)
        .ok_or_else(|| LayoutError::invalid(key, "does not start with the listed prefix"))?;
    let is_directory = key.ends_with(KEY_SEPARATOR);
    let parts = components(relative, key)?;

    if parts.is_empty() {
        if is_directory {
            return Ok(None);
        }
        // The prefix names this object exactly
        return Ok(Some(LocalTarget::File(base.join(base_name(key)?))));
    }

    let path = parts
        .iter()
        .fold(base.to_path_buf(), |path, part| path.join(part));

    Ok(Some(if is_directory {
        LocalTarget::Directory(path)
    } else {
        LocalTarget::File(path)
    }))
}

/// The local layout for a batch of remote keys.
#[derive(Debug, Clone, Default)]
pub struct LocalLayout {
    base: PathBuf,
    targets: BTreeMap<String, LocalTarget>,
    rejected: Vec<LayoutError>,
}

impl LocalLayout {
    /// Target for a key, if it was mapped.
    pub fn target(&self, key: &str) -> Option<&LocalTarget> {
        self.targets.get(key)
    }

    /// Keys that download to a file, with their paths, in key order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.targets.iter().filter_map(|(key, target)| match target {
            LocalTarget::File(path) => Some((key.as_str(), path.as_path())),
            LocalTarget::Directory(_) => None,
        })
    }

    /// Directory placeholder keys with their paths.
    pub fn placeholders(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.targets.iter().filter_map(|(key, target)| match target {
            LocalTarget::Directory(path) => Some((key.as_str(), path.as_path())),
            LocalTarget::File(_) => None,
        })
    }

    /// Keys that could not be mapped.
    pub fn rejected(&self) -> &[LayoutError] {
        &self.rejected
    }

    /// Every directory that must exist before files are written: directory
    /// placeholders and the parents of files, excluding the base itself.
    ///
    /// Sorted so that each parent comes before its children.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = BTreeSet::new();
        for target in self.targets.values() {
            let mut current = match target {
                LocalTarget::Directory(path) => Some(path.as_path()),
                LocalTarget::File(path) => path.parent(),
            };
            while let Some(dir) = current {
                if dir == self.base || !dir.starts_with(&self.base) {
                    break;
                }
                if !dirs.insert(dir.to_path_buf()) {
                    break;
                }
                current = dir.parent();
            }
        }
        dirs.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Map a batch of keys listed under `prefix` to local targets under `base`.
pub fn remote_keys_to_local_layout<'a, I>(keys: I, prefix: &str, base: &Path) -> LocalLayout
where
    I: IntoIterator<Item = &'a str>,
{
    let mut layout = LocalLayout {
        base: base.to_path_buf(),
        ..Default::default()
    };

    for key in keys {
        match local_target(key, prefix, base) {
            Ok(Some(target)) => {
                layout.targets.insert(key.to_string(), target);
            }
            Ok(None) => {}
            Err(e) => layout.rejected.push(e),
        }
    }

    layout
}

/// Create directories in order, continuing past failures.
///
/// Returns the directories that could not be created.
pub async fn create_directories(dirs: &[PathBuf]) -> Vec<(PathBuf, std::io::Error)> {
    let mut failed: Vec<(PathBuf, std::io::Error)> = Vec::new();
    for dir in dirs {
        // Children of a failed directory will fail the same way
        if failed.iter().any(|(parent, _)| dir.starts_with(parent)) {
            continue;
        }
        if let Err(e) = fs::create_dir_all(dir).await {
            failed.push((dir.clone(), e));
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base() -> PathBuf {
        PathBuf::from("/staging")
    }

    #[test]
    fn test_file_under_prefix() {
        let target = local_target("data/sub/a.txt", "data/", &base()).unwrap();
        assert_eq!(
            target,
            Some(LocalTarget::File(PathBuf::from("/staging/sub/a.txt")))
        );
    }

    #[test]
    fn test_directory_placeholder() {
        let target = local_target("data/sub/", "data/", &base()).unwrap();
        assert_eq!(
            target,
            Some(LocalTarget::Directory(PathBuf::from("/staging/sub")))
        );

        // The prefix's own placeholder maps to nothing
        assert_eq!(local_target("data/", "data/", &base()).unwrap(), None);
    }

    #[test]
    fn test_exact_object_match_uses_base_name() {
        let target = local_target(
            "drivers/NVIDIA-Linux-x86_64-535.86.05.run",
            "drivers/NVIDIA-Linux-x86_64-535.86.05.run",
            &base(),
        )
        .unwrap();
        assert_eq!(
            target,
            Some(LocalTarget::File(PathBuf::from(
                "/staging/NVIDIA-Linux-x86_64-535.86.05.run"
            )))
        );
    }

    #[test]
    fn test_prefix_without_separator() {
        let target = local_target("data/a.txt", "data", &base()).unwrap();
        assert_eq!(
            target,
            Some(LocalTarget::File(PathBuf::from("/staging/a.txt")))
        );
    }

    #[test]
    fn test_redundant_separators_are_dropped() {
        let target = local_target("data//x/./y.txt", "data/", &base()).unwrap();
        assert_eq!(
            target,
            Some(LocalTarget::File(PathBuf::from("/staging/x/y.txt")))
        );
    }

    #[test]
    fn test_traversal_rejected() {
        for key in ["data/../etc/passwd", "data/a/../../b", "data/.."] {
            assert!(
                matches!(
                    local_target(key, "data/", &base()),
                    Err(LayoutError::InvalidKey { .. })
                ),
                "{} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_key_outside_prefix_rejected() {
        assert!(local_target("other/a.txt", "data/", &base()).is_err());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c.bin").unwrap(), "c.bin");
        assert_eq!(base_name("a/b/").unwrap(), "b");
        assert!(base_name("").is_err());
        assert!(base_name("a/..").is_err());
    }

    #[test]
    fn test_layout_batch() {
        let keys = [
            "data/",
            "data/a.txt",
            "data/empty/",
            "data/x/y/z.txt",
            "data/../escape.txt",
        ];
        let layout = remote_keys_to_local_layout(keys, "data/", &base());

        assert_eq!(layout.len(), 3);
        assert_eq!(layout.rejected().len(), 1);

        let files: Vec<_> = layout.files().map(|(k, _)| k).collect();
        assert_eq!(files, vec!["data/a.txt", "data/x/y/z.txt"]);

        let placeholders: Vec<_> = layout.placeholders().map(|(k, _)| k).collect();
        assert_eq!(placeholders, vec!["data/empty/"]);

        assert_eq!(
            layout.directories(),
            vec![
                PathBuf::from("/staging/empty"),
                PathBuf::from("/staging/x"),
                PathBuf::from("/staging/x/y"),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_directories() {
        let temp = TempDir::new().unwrap();
        let keys = ["p/a/b/c.txt", "p/d/", "p/e.txt"];
        let layout = remote_keys_to_local_layout(keys, "p/", temp.path());

        let failed = create_directories(&layout.directories()).await;
        assert!(failed.is_empty());
        assert!(temp.path().join("a/b").is_dir());
        assert!(temp.path().join("d").is_dir());
        assert!(!temp.path().join("e.txt").exists());
    }

    #[tokio::test]
    async fn test_create_directories_reports_failures() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocked"), b"file").unwrap();

        let dirs = vec![
            temp.path().join("blocked"),
            temp.path().join("blocked/child"),
            temp.path().join("fine"),
        ];
        let failed = create_directories(&dirs).await;

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, temp.path().join("blocked"));
        assert!(temp.path().join("fine").is_dir());
    }
}
