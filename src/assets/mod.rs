use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::{config::AssetBackendConfig, error::with_timeout, uploads::ImageUpload};

mod cloudinary;
mod s3;

pub use cloudinary::CloudinaryAssetHost;
pub use s3::S3AssetHost;

/// Folder designs are filed under on the asset host.
pub const DESIGNS_FOLDER: &str = "jewelry_designs";

/// Reference to an uploaded asset: where it is served from and how to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
    pub asset_id: String,
}

#[async_trait]
pub trait AssetHost: Send + Sync {
    async fn upload(&self, folder: Option<&str>, image: &ImageUpload) -> anyhow::Result<UploadedAsset>;
    async fn destroy(&self, asset_id: &str) -> anyhow::Result<()>;
}

pub async fn from_config(
    cfg: &AssetBackendConfig,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn AssetHost>> {
    let host: Arc<dyn AssetHost> = match cfg {
        AssetBackendConfig::S3(s3) => {
            info!(endpoint = %s3.endpoint, bucket = %s3.bucket, "using s3 asset host");
            Arc::new(S3AssetHost::new(s3).await?)
        }
        AssetBackendConfig::Cloudinary(c) => {
            info!(cloud = %c.cloud_name, "using cloudinary asset host");
            Arc::new(CloudinaryAssetHost::new(c, timeout)?)
        }
    };
    Ok(host)
}

/// Best-effort removal of an asset whose owning operation failed afterwards.
pub async fn discard(host: &dyn AssetHost, asset: &UploadedAsset, timeout: Duration) {
    match with_timeout(timeout, "asset destroy", host.destroy(&asset.asset_id)).await {
        Ok(()) => info!(asset_id = %asset.asset_id, "discarded orphaned asset"),
        Err(e) => warn!(error = %e, asset_id = %asset.asset_id, "failed to discard orphaned asset"),
    }
}
