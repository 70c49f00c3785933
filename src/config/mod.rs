//! Configuration module.

mod env_config;
mod read_config;
mod types;

pub use env_config::config_from_env;
pub use read_config::{
    ConfigError, ConfigOrigin, ConfigSource, LoadedConfig, Result as ConfigResult,
    load_config_file, parse_config, read_config, read_config_with, resolve_request,
};
pub use types::{
    AliOssConfig, BackendKind, CloudsConfig, Config, PathOverrides, SyncRequest, SyncSettings,
    TencentCosConfig, WanJiePublicFsConfig, WanJieS3Config,
};
