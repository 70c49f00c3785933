//! Configuration types for cloud-data-sync.
//!
//! [`Config`] mirrors the TOML file layout. The environment variable source
//! fills the same structure, so both sources resolve into a [`SyncRequest`]
//! through one code path.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Backend Kind
// =============================================================================

/// The kind of data source a sync reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    AliOss,
    TencentCos,
    WanjieS3,
    /// Shared filesystem mounted locally; no object store involved.
    WanjiePublicFs,
}

impl BackendKind {
    pub const ALL: [BackendKind; 4] = [
        BackendKind::AliOss,
        BackendKind::TencentCos,
        BackendKind::WanjieS3,
        BackendKind::WanjiePublicFs,
    ];

    /// The name used for this backend in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::AliOss => "ali-oss",
            BackendKind::TencentCos => "tencent-cos",
            BackendKind::WanjieS3 => "wanjie-s3",
            BackendKind::WanjiePublicFs => "wanjie-public-fs",
        }
    }

    /// Whether this backend is an object store (as opposed to a filesystem).
    pub fn is_object_store(&self) -> bool {
        !matches!(self, BackendKind::WanjiePublicFs)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown platform '{}'", s))
    }
}

// =============================================================================
// Sync Request
// =============================================================================

/// A fully resolved description of one sync run.
///
/// For object-store backends `source` is the key prefix inside `bucket`; for
/// `wanjie-public-fs` it is the absolute source directory.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SyncRequest {
    pub backend: BackendKind,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key: Option<String>,
    #[serde(serialize_with = "serialize_redacted")]
    pub secret_key: Option<String>,
    pub bucket: Option<String>,
    pub source: String,
    pub destination: PathBuf,
}

const REDACTED: &str = "******";

fn serialize_redacted<S: Serializer>(
    value: &Option<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(_) => serializer.serialize_str(REDACTED),
        None => serializer.serialize_none(),
    }
}

impl fmt::Debug for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRequest")
            .field("backend", &self.backend)
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| REDACTED))
            .field("bucket", &self.bucket)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .finish()
    }
}

// =============================================================================
// Config File Sections
// =============================================================================

/// Root of the configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub clouds: CloudsConfig,
    pub sync: SyncSettings,
}

/// [clouds] section - which platform to read from and where to write.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CloudsConfig {
    /// One of `ali-oss`, `tencent-cos`, `wanjie-s3`, `wanjie-public-fs`.
    pub platform: String,
    pub user_fs_mount_point: String,
    /// Destination path relative to `user_fs_mount_point`.
    pub dst_path: String,
    /// Source path: an object prefix, or a path relative to the public mount.
    pub src_data_path: String,
    #[serde(rename = "ali-oss")]
    pub ali_oss: AliOssConfig,
    #[serde(rename = "tencent-cos")]
    pub tencent_cos: TencentCosConfig,
    #[serde(rename = "wanjie-s3")]
    pub wanjie_s3: WanJieS3Config,
    #[serde(rename = "wanjie-public-fs")]
    pub wanjie_public_fs: WanJiePublicFsConfig,
}

/// Per-platform overrides of the shared [clouds] path fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathOverrides {
    pub user_fs_mount_point: Option<String>,
    pub dst_path: Option<String>,
    pub src_data_path: Option<String>,
}

/// [clouds.ali-oss]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AliOssConfig {
    pub endpoint_addr: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(flatten)]
    pub paths: PathOverrides,
}

/// [clouds.tencent-cos]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TencentCosConfig {
    pub endpoint_addr: String,
    pub region: String,
    pub secret_id: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(flatten)]
    pub paths: PathOverrides,
}

/// [clouds.wanjie-s3]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WanJieS3Config {
    pub endpoint_addr: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    #[serde(flatten)]
    pub paths: PathOverrides,
}

/// [clouds.wanjie-public-fs]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WanJiePublicFsConfig {
    pub public_fs_mount_point: String,
    #[serde(flatten)]
    pub paths: PathOverrides,
}

/// [sync] section - tuning for the sync run itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub page_size: Option<i32>,
    pub request_timeout_secs: Option<u64>,
    pub staging_dir: Option<PathBuf>,
}
