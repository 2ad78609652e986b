use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use uuid::Uuid;

use super::{AssetHost, UploadedAsset};
use crate::{config::S3Config, uploads::ImageUpload};

/// S3/MinIO bucket serving objects under a public base URL. The object key is the asset id.
#[derive(Clone)]
pub struct S3AssetHost {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3AssetHost {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn object_key(folder: Option<&str>, id: Uuid, ext: &str) -> String {
    match folder {
        Some(folder) => format!("{}/{}.{}", folder.trim_matches('/'), id, ext),
        None => format!("{}.{}", id, ext),
    }
}

fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base, key)
}

#[async_trait]
impl AssetHost for S3AssetHost {
    async fn upload(&self, folder: Option<&str>, image: &ImageUpload) -> anyhow::Result<UploadedAsset> {
        let ext = image.extension().unwrap_or_else(|| "bin".into());
        let key = object_key(folder, Uuid::new_v4(), &ext);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(image.body.clone()))
            .content_type(&image.content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {}", key))?;
        Ok(UploadedAsset {
            url: public_url(&self.public_base_url, &key),
            asset_id: key,
        })
    }

    async fn destroy(&self, asset_id: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(asset_id)
            .send()
            .await
            .with_context(|| format!("s3 delete_object {}", asset_id))?;
        Ok(())
    }
}
