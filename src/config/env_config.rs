//! Environment variable configuration source.
//!
//! The variables are flat; they fill the same [`Config`] structure as the
//! TOML file. `BUCKET` and `SRC_DATA_PATH` are shared by every platform.

use super::read_config::{ConfigError, Result};
use super::types::Config;

pub const ENV_PLATFORM_TYPE: &str = "PLATFORM_TYPE";
pub const ENV_USER_FS_MOUNT_POINT: &str = "USER_FS_MOUNT_POINT";
pub const ENV_DST_PATH: &str = "DST_PATH";
pub const ENV_SRC_DATA_PATH: &str = "SRC_DATA_PATH";
pub const ENV_BUCKET: &str = "BUCKET";
pub const ENV_ALI_ENDPOINT_ADDR: &str = "ALI_ENDPOINT_ADDR";
pub const ENV_ALI_OSS_ACCESS_KEY: &str = "ALI_OSS_ACCESS_KEY";
pub const ENV_ALI_OSS_SECRET_KEY: &str = "ALI_OSS_SECRET_KEY";
pub const ENV_PUBLIC_FS_MOUNT_POINT: &str = "PUBLIC_FS_MOUNT_POINT";
pub const ENV_WANJIE_S3_ENDPOINT_ADDR: &str = "WANJIE_S3_ENDPOINT_ADDR";
pub const ENV_WANJIE_S3_REGION: &str = "WANJIE_S3_REGION";
pub const ENV_WANJIE_S3_ACCESS_KEY: &str = "WANJIE_S3_ACCESS_KEY";
pub const ENV_WANJIE_S3_SECRET_KEY: &str = "WANJIE_S3_SECRET_KEY";
pub const ENV_TENCENT_COS_ENDPOINT_ADDR: &str = "TENCENT_COS_ENDPOINT_ADDR";
pub const ENV_TENCENT_COS_REGION: &str = "TENCENT_COS_REGION";
pub const ENV_TENCENT_COS_SECRET_ID: &str = "TENCENT_COS_SECRET_ID";
pub const ENV_TENCENT_COS_SECRET_KEY: &str = "TENCENT_COS_SECRET_KEY";
pub const ENV_SYNC_PAGE_SIZE: &str = "SYNC_PAGE_SIZE";
pub const ENV_SYNC_REQUEST_TIMEOUT_SECS: &str = "SYNC_REQUEST_TIMEOUT_SECS";

/// Build a [`Config`] from environment variables read through `lookup`.
pub fn config_from_env<F>(lookup: &F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(name).unwrap_or_default();

    let mut config = Config::default();

    let clouds = &mut config.clouds;
    clouds.platform = var(ENV_PLATFORM_TYPE);
    clouds.user_fs_mount_point = var(ENV_USER_FS_MOUNT_POINT);
    clouds.dst_path = var(ENV_DST_PATH);
    clouds.src_data_path = var(ENV_SRC_DATA_PATH);

    let bucket = var(ENV_BUCKET);

    clouds.ali_oss.endpoint_addr = var(ENV_ALI_ENDPOINT_ADDR);
    clouds.ali_oss.access_key = var(ENV_ALI_OSS_ACCESS_KEY);
    clouds.ali_oss.secret_key = var(ENV_ALI_OSS_SECRET_KEY);
    clouds.ali_oss.bucket = bucket.clone();

    clouds.wanjie_s3.endpoint_addr = var(ENV_WANJIE_S3_ENDPOINT_ADDR);
    clouds.wanjie_s3.region = var(ENV_WANJIE_S3_REGION);
    clouds.wanjie_s3.access_key = var(ENV_WANJIE_S3_ACCESS_KEY);
    clouds.wanjie_s3.secret_key = var(ENV_WANJIE_S3_SECRET_KEY);
    clouds.wanjie_s3.bucket = bucket.clone();

    clouds.tencent_cos.endpoint_addr = var(ENV_TENCENT_COS_ENDPOINT_ADDR);
    clouds.tencent_cos.region = var(ENV_TENCENT_COS_REGION);
    clouds.tencent_cos.secret_id = var(ENV_TENCENT_COS_SECRET_ID);
    clouds.tencent_cos.secret_key = var(ENV_TENCENT_COS_SECRET_KEY);
    clouds.tencent_cos.bucket = bucket;

    clouds.wanjie_public_fs.public_fs_mount_point = var(ENV_PUBLIC_FS_MOUNT_POINT);

    config.sync.page_size = parse_number(ENV_SYNC_PAGE_SIZE, lookup(ENV_SYNC_PAGE_SIZE))?;
    config.sync.request_timeout_secs = parse_number(
        ENV_SYNC_REQUEST_TIMEOUT_SECS,
        lookup(ENV_SYNC_REQUEST_TIMEOUT_SECS),
    )?;

    Ok(config)
}

fn parse_number<T>(key: &str, value: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidInteger {
            key: key.to_string(),
            value: v.to_string(),
            message: e.to_string(),
        }),
    }
}
