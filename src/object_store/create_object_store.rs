//! Object store creation from a resolved sync request.

use crate::config::{BackendKind, SyncRequest};
use crate::object_store::{
    ObjectStore, ObjectStoreError, Result, S3Flavor, S3ObjectStore, S3ObjectStoreConfig,
};

impl S3ObjectStoreConfig {
    /// Build the client configuration for a request.
    ///
    /// Returns None for backends that are not object stores.
    pub fn from_request(request: &SyncRequest) -> Option<Self> {
        let flavor = match request.backend {
            BackendKind::AliOss => S3Flavor::AliOss,
            BackendKind::TencentCos => S3Flavor::TencentCos,
            BackendKind::WanjieS3 => S3Flavor::WanJieS3,
            BackendKind::WanjiePublicFs => return None,
        };

        let mut config = S3ObjectStoreConfig::new(
            flavor,
            request.endpoint.clone().unwrap_or_default(),
            request.access_key.clone().unwrap_or_default(),
            request.secret_key.clone().unwrap_or_default(),
        );
        if let Some(region) = &request.region {
            config = config.with_region(region.clone());
        }
        Some(config)
    }
}

/// Create the object store client a request calls for.
pub async fn create_object_store(request: &SyncRequest) -> Result<Box<dyn ObjectStore>> {
    let config = S3ObjectStoreConfig::from_request(request).ok_or_else(|| {
        ObjectStoreError::AuthConfig(format!("{} is not an object store", request.backend))
    })?;

    Ok(Box::new(S3ObjectStore::new(config).await?))
}
