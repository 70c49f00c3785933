//! Configuration reading and resolution.
//!
//! Configuration comes from a TOML file or from environment variables. Both
//! produce a [`Config`], which [`resolve_request`] turns into the
//! [`SyncRequest`] handed to the sync core.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::env_config::config_from_env;
use super::types::{BackendKind, Config, PathOverrides, SyncRequest};

const ENV_CONFIG_FILE: &str = "CDS_CONFIG_FILE";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid integer '{value}' for '{key}': {message}")]
    InvalidInteger {
        key: String,
        value: String,
        message: String,
    },

    #[error("missing required field '{field}' in section '{section}'")]
    MissingField { section: String, field: String },
}

/// Result type for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// =============================================================================
// ConfigSource
// =============================================================================

/// Specifies where configuration is read from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    /// Explicit config file path from the CLI. If specified and missing, error.
    /// If None, fall back to CDS_CONFIG_FILE, then to environment variables.
    pub config_file: Option<PathBuf>,

    /// Skip config files entirely and read environment variables.
    pub from_env: bool,
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Environment,
}

/// A configuration together with how it was located.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub origin: ConfigOrigin,
    /// Warning message if CDS_CONFIG_FILE pointed to a nonexistent file.
    pub warning: Option<String>,
}

/// Read configuration from the process environment.
pub fn read_config(source: &ConfigSource) -> Result<LoadedConfig> {
    read_config_with(source, |name| env::var(name).ok())
}

/// Read configuration using `lookup` for environment variables.
pub fn read_config_with<F>(source: &ConfigSource, lookup: F) -> Result<LoadedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if source.from_env {
        return Ok(LoadedConfig {
            config: config_from_env(&lookup)?,
            origin: ConfigOrigin::Environment,
            warning: None,
        });
    }

    // An explicit path must exist
    if let Some(ref path) = source.config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.clone()));
        }
        return Ok(LoadedConfig {
            config: load_config_file(path)?,
            origin: ConfigOrigin::File(path.clone()),
            warning: None,
        });
    }

    let mut warning = None;
    if let Some(env_path) = lookup(ENV_CONFIG_FILE).filter(|p| !p.is_empty()) {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(LoadedConfig {
                config: load_config_file(&path)?,
                origin: ConfigOrigin::File(path),
                warning: None,
            });
        }
        // Warn but continue with environment variables
        warning = Some(format!(
            "config file specified by {} does not exist: {}",
            ENV_CONFIG_FILE, env_path
        ));
    }

    Ok(LoadedConfig {
        config: config_from_env(&lookup)?,
        origin: ConfigOrigin::Environment,
        warning,
    })
}

/// Load and parse a TOML config file.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_config(&contents).map_err(|e| match e {
        ConfigError::ParseError { message, .. } => ConfigError::ParseError {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Parse TOML configuration text.
pub fn parse_config(contents: &str) -> Result<Config> {
    toml::from_str(contents).map_err(|e| ConfigError::ParseError {
        path: PathBuf::new(),
        message: e.to_string(),
    })
}

// =============================================================================
// Request Resolution
// =============================================================================

/// Resolve a [`SyncRequest`] from a configuration.
///
/// Returns None when the platform is unset or not recognized.
pub fn resolve_request(config: &Config) -> Result<Option<SyncRequest>> {
    let clouds = &config.clouds;
    let Ok(backend) = clouds.platform.parse::<BackendKind>() else {
        return Ok(None);
    };

    let request = match backend {
        BackendKind::AliOss => {
            let section = "clouds.ali-oss";
            let ali = &clouds.ali_oss;
            let (source, destination) = resolve_paths(config, &ali.paths, section)?;
            SyncRequest {
                backend,
                endpoint: Some(required(section, "endpoint_addr", &ali.endpoint_addr)?),
                region: None,
                access_key: Some(required(section, "access_key", &ali.access_key)?),
                secret_key: Some(required(section, "secret_key", &ali.secret_key)?),
                bucket: Some(required(section, "bucket", &ali.bucket)?),
                source,
                destination,
            }
        }
        BackendKind::TencentCos => {
            let section = "clouds.tencent-cos";
            let cos = &clouds.tencent_cos;
            let (source, destination) = resolve_paths(config, &cos.paths, section)?;
            SyncRequest {
                backend,
                endpoint: Some(required(section, "endpoint_addr", &cos.endpoint_addr)?),
                region: optional(&cos.region),
                access_key: Some(required(section, "secret_id", &cos.secret_id)?),
                secret_key: Some(required(section, "secret_key", &cos.secret_key)?),
                bucket: Some(required(section, "bucket", &cos.bucket)?),
                source,
                destination,
            }
        }
        BackendKind::WanjieS3 => {
            let section = "clouds.wanjie-s3";
            let s3 = &clouds.wanjie_s3;
            let (source, destination) = resolve_paths(config, &s3.paths, section)?;
            SyncRequest {
                backend,
                endpoint: Some(required(section, "endpoint_addr", &s3.endpoint_addr)?),
                region: optional(&s3.region),
                access_key: Some(required(section, "access_key", &s3.access_key)?),
                secret_key: Some(required(section, "secret_key", &s3.secret_key)?),
                bucket: Some(required(section, "bucket", &s3.bucket)?),
                source,
                destination,
            }
        }
        BackendKind::WanjiePublicFs => {
            let section = "clouds.wanjie-public-fs";
            let public_fs = &clouds.wanjie_public_fs;
            let mount = required(
                section,
                "public_fs_mount_point",
                &public_fs.public_fs_mount_point,
            )?;
            let (relative_source, destination) =
                resolve_paths(config, &public_fs.paths, section)?;
            SyncRequest {
                backend,
                endpoint: None,
                region: None,
                access_key: None,
                secret_key: None,
                bucket: None,
                source: join_under(&mount, &relative_source)
                    .to_string_lossy()
                    .into_owned(),
                destination,
            }
        }
    };

    Ok(Some(request))
}

/// Resolve the source path and destination directory, preferring the
/// platform section's overrides over the shared [clouds] fields.
fn resolve_paths(
    config: &Config,
    overrides: &PathOverrides,
    section: &str,
) -> Result<(String, PathBuf)> {
    let clouds = &config.clouds;
    let pick = |specific: &Option<String>, shared: &String| -> String {
        specific
            .as_ref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(shared)
            .trim()
            .to_string()
    };

    let mount = pick(&overrides.user_fs_mount_point, &clouds.user_fs_mount_point);
    let dst_path = pick(&overrides.dst_path, &clouds.dst_path);
    let source = pick(&overrides.src_data_path, &clouds.src_data_path);

    if mount.is_empty() && dst_path.is_empty() {
        return Err(ConfigError::MissingField {
            section: section.to_string(),
            field: "dst_path".to_string(),
        });
    }

    Ok((source, join_under(&mount, &dst_path)))
}

/// Join `relative` under `base` even when `relative` starts with a separator.
fn join_under(base: &str, relative: &str) -> PathBuf {
    let relative = relative.trim_start_matches('/');
    if base.is_empty() {
        PathBuf::from(relative)
    } else if relative.is_empty() {
        PathBuf::from(base)
    } else {
        Path::new(base).join(relative)
    }
}

fn required(section: &str, field: &str, value: &str) -> Result<String> {
    optional(value).ok_or_else(|| ConfigError::MissingField {
        section: section.to_string(),
        field: field.to_string(),
    })
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

// =============================================================================
// Tests
// =============================================================================
