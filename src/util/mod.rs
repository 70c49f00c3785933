//! Local filesystem helpers.

pub mod copy_dir;

pub use copy_dir::{CopyError, CopyStats, copy_dir};
