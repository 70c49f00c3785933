//! CLI command implementations.

pub mod copy;
pub mod show_config;
pub mod sync;
