//! S3-compatible ObjectStore implementation.
//!
//! Aliyun OSS, Tencent COS and the WanJie Ceph gateway all speak the S3
//! protocol; they differ only in addressing style and how the signing region
//! is named. [`S3Flavor`] captures those differences.

use crate::object_store::{
    KEY_SEPARATOR, ListingPage, ObjectBody, ObjectStore, ObjectStoreError, RemoteObject, Result,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use url::Url;

const DEFAULT_REGION: &str = "us-east-1";
const CREDENTIALS_PROVIDER_NAME: &str = "cloud-data-sync";

// =============================================================================
// Configuration
// =============================================================================

/// Which S3-compatible service an [`S3ObjectStore`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Flavor {
    /// Aliyun OSS, virtual-hosted addressing.
    AliOss,
    /// Tencent COS, virtual-hosted addressing.
    TencentCos,
    /// WanJie S3 (Ceph RGW), path-style addressing.
    WanJieS3,
}

impl S3Flavor {
    pub fn name(&self) -> &'static str {
        match self {
            S3Flavor::AliOss => "ali-oss",
            S3Flavor::TencentCos => "tencent-cos",
            S3Flavor::WanJieS3 => "wanjie-s3",
        }
    }

    fn force_path_style(&self) -> bool {
        matches!(self, S3Flavor::WanJieS3)
    }

    /// Derive the signing region from the endpoint host.
    ///
    /// - OSS: `oss-cn-beijing.aliyuncs.com` -> `oss-cn-beijing`
    /// - COS: `cos.ap-guangzhou.myqcloud.com` -> `ap-guangzhou`
    fn region_from_host(&self, host: &str) -> Option<String> {
        let labels: Vec<&str> = host.split('.').collect();
        match self {
            S3Flavor::AliOss => labels
                .iter()
                .find(|label| label.starts_with("oss-"))
                .map(|label| label.trim_end_matches("-internal").to_string()),
            S3Flavor::TencentCos => labels
                .iter()
                .position(|label| *label == "cos")
                .and_then(|i| labels.get(i + 1))
                .filter(|label| !label.is_empty())
                .map(|label| label.to_string()),
            S3Flavor::WanJieS3 => None,
        }
    }
}

/// Configuration for S3ObjectStore.
#[derive(Clone)]
pub struct S3ObjectStoreConfig {
    pub flavor: S3Flavor,
    /// Service endpoint, e.g. `https://oss-cn-beijing.aliyuncs.com`.
    pub endpoint_url: String,
    /// Optional region override.
    pub region: Option<String>,
    pub access_key: String,
    pub secret_key: String,
}

impl S3ObjectStoreConfig {
    pub fn new(
        flavor: S3Flavor,
        endpoint_url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            flavor,
            endpoint_url: endpoint_url.into(),
            region: None,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Set a region override.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Check the endpoint and credentials, returning the normalized endpoint
    /// URL and the signing region.
    fn validate(&self) -> Result<(String, String)> {
        if self.access_key.trim().is_empty() || self.secret_key.trim().is_empty() {
            return Err(ObjectStoreError::AuthConfig(format!(
                "{}: access key and secret key are required",
                self.flavor.name()
            )));
        }

        let endpoint = normalize_endpoint(&self.endpoint_url);
        let url = Url::parse(&endpoint).map_err(|e| {
            ObjectStoreError::AuthConfig(format!(
                "{}: invalid endpoint '{}': {}",
                self.flavor.name(),
                self.endpoint_url,
                e
            ))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ObjectStoreError::AuthConfig(format!(
                "{}: unsupported endpoint scheme '{}'",
                self.flavor.name(),
                url.scheme()
            )));
        }
        let host = url.host_str().ok_or_else(|| {
            ObjectStoreError::AuthConfig(format!(
                "{}: endpoint '{}' has no host",
                self.flavor.name(),
                self.endpoint_url
            ))
        })?;

        let region = match &self.region {
            Some(region) if !region.trim().is_empty() => region.trim().to_string(),
            _ => self
                .flavor
                .region_from_host(host)
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        };

        Ok((endpoint.trim_end_matches('/').to_string(), region))
    }
}

impl std::fmt::Debug for S3ObjectStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStoreConfig")
            .field("flavor", &self.flavor)
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

/// Prepend `https://` to endpoints given as a bare host.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

// =============================================================================
// S3ObjectStore
// =============================================================================

/// An ObjectStore backed by an S3-compatible service.
pub struct S3ObjectStore {
    client: Client,
    flavor: S3Flavor,
}

impl S3ObjectStore {
    /// Create a client for the given configuration.
    ///
    /// Only the static credentials from the configuration are used.
    pub async fn new(config: S3ObjectStoreConfig) -> Result<Self> {
        let (endpoint, region) = config.validate()?;

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
            .endpoint_url(&endpoint)
            .force_path_style(config.flavor.force_path_style())
            .build();

        tracing::debug!(
            backend = config.flavor.name(),
            endpoint = %endpoint,
            region = %region,
            "created object store client"
        );

        Ok(Self {
            client: Client::from_conf(s3_config),
            flavor: config.flavor,
        })
    }
}

fn status_of<E>(err: &SdkError<E>) -> Option<u16> {
    match err {
        SdkError::ServiceError(e) => Some(e.raw().status().as_u16()),
        _ => None,
    }
}

fn map_sdk_error<E>(err: SdkError<E>, subject: &str) -> ObjectStoreError
where
    E: std::error::Error + 'static,
{
    match status_of(&err) {
        Some(404) => ObjectStoreError::NotFound(subject.to_string()),
        Some(401) | Some(403) => {
            ObjectStoreError::AccessDenied(format!("{}: {}", subject, DisplayErrorContext(&err)))
        }
        _ => ObjectStoreError::Network(format!("{}: {}", subject, DisplayErrorContext(&err))),
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        self.flavor.name()
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: i32,
    ) -> Result<ListingPage> {
        let mut request = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(page_size);

        if !prefix.is_empty() {
            request = request.prefix(prefix);
        }

        if let Some(token) = cursor {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &format!("{}/{}", bucket, prefix)))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|key| RemoteObject {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                })
            })
            .collect();

        Ok(ListingPage {
            objects,
            next_cursor: response.next_continuation_token().map(|s| s.to_string()),
            is_truncated: response.is_truncated() == Some(true),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        if key.is_empty() || key.ends_with(KEY_SEPARATOR) {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let key = key.to_string();
        let body = futures::stream::unfold(Some(response.body), move |state| {
            let key = key.clone();
            async move {
                let Some(mut body) = state else {
                    return None;
                };
                match body.next().await {
                    Some(Ok(bytes)) => Some((Ok(bytes), Some(body))),
                    Some(Err(e)) => Some((
                        Err(ObjectStoreError::Network(format!("{}: {}", key, e))),
                        None,
                    )),
                    None => None,
                }
            }
        });

        Ok(Box::pin(body))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(flavor: S3Flavor, endpoint: &str) -> S3ObjectStoreConfig {
        S3ObjectStoreConfig::new(flavor, endpoint, "ak", "sk")
    }

    #[test]
    fn test_config_builder() {
        let config = config(S3Flavor::WanJieS3, "http://rgw.local:7480").with_region("cn-east");

        assert_eq!(config.flavor, S3Flavor::WanJieS3);
        assert_eq!(config.endpoint_url, "http://rgw.local:7480");
        assert_eq!(config.region, Some("cn-east".to_string()));
    }

    #[test]
    fn test_ali_region_from_endpoint() {
        let (endpoint, region) = config(S3Flavor::AliOss, "https://oss-cn-beijing.aliyuncs.com")
            .validate()
            .unwrap();
        assert_eq!(endpoint, "https://oss-cn-beijing.aliyuncs.com");
        assert_eq!(region, "oss-cn-beijing");

        let (_, region) = config(S3Flavor::AliOss, "oss-cn-shanghai-internal.aliyuncs.com")
            .validate()
            .unwrap();
        assert_eq!(region, "oss-cn-shanghai");
    }

    #[test]
    fn test_tencent_region_from_endpoint() {
        let (_, region) = config(S3Flavor::TencentCos, "https://cos.ap-guangzhou.myqcloud.com")
            .validate()
            .unwrap();
        assert_eq!(region, "ap-guangzhou");
    }

    #[test]
    fn test_wanjie_region_defaults() {
        let (endpoint, region) = config(S3Flavor::WanJieS3, "http://10.0.0.8:7480/")
            .validate()
            .unwrap();
        assert_eq!(endpoint, "http://10.0.0.8:7480");
        assert_eq!(region, DEFAULT_REGION);

        let (_, region) = config(S3Flavor::WanJieS3, "http://10.0.0.8:7480")
            .with_region("zone-a")
            .validate()
            .unwrap();
        assert_eq!(region, "zone-a");
    }

    #[test]
    fn test_bare_host_gets_https() {
        assert_eq!(normalize_endpoint("example.com"), "https://example.com");
        assert_eq!(normalize_endpoint(" http://example.com "), "http://example.com");
    }

    #[test]
    fn test_rejects_bad_endpoint_and_credentials() {
        let result = config(S3Flavor::WanJieS3, "ftp://host").validate();
        assert!(matches!(result, Err(ObjectStoreError::AuthConfig(_))));

        let result = config(S3Flavor::WanJieS3, "http://").validate();
        assert!(matches!(result, Err(ObjectStoreError::AuthConfig(_))));

        let result = S3ObjectStoreConfig::new(S3Flavor::AliOss, "https://oss.example.com", "", "sk")
            .validate();
        assert!(matches!(result, Err(ObjectStoreError::AuthConfig(_))));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", config(S3Flavor::AliOss, "https://oss.example.com"));
        assert!(rendered.contains("access_key"));
        assert!(!rendered.contains("secret_key"));
    }
}
