use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{AssetHost, UploadedAsset};
use crate::{config::CloudinaryConfig, uploads::ImageUpload};

/// Cloudinary image host using signed uploads.
///
/// Signatures are SHA-256, so the product environment must be configured for
/// SHA-256 signing.
#[derive(Clone)]
pub struct CloudinaryAssetHost {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl CloudinaryAssetHost {
    pub fn new(cfg: &CloudinaryConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build cloudinary http client")?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/{}/image",
                cfg.api_base.trim_end_matches('/'),
                cfg.cloud_name
            ),
            api_key: cfg.api_key.clone(),
            api_secret: cfg.api_secret.clone(),
        })
    }

    fn signed_params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp().to_string();
        params.push(("timestamp", timestamp));
        let signature = sign(&params, &self.api_secret);
        params.push(("api_key", self.api_key.clone()));
        params.push(("signature", signature));
        params
    }

    async fn check(&self, res: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| body.trim().to_string());
        anyhow::bail!("cloudinary {} failed with status {}: {}", what, status, message)
    }
}

/// `sha256(k1=v1&k2=v2...<secret>)` over the params sorted by name.
fn sign(params: &[(&'static str, String)], secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by_key(|(k, _)| *k);
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha256::digest(format!("{}{}", joined, secret).as_bytes()))
}

#[async_trait]
impl AssetHost for CloudinaryAssetHost {
    async fn upload(&self, folder: Option<&str>, image: &ImageUpload) -> anyhow::Result<UploadedAsset> {
        let mut params = Vec::new();
        if let Some(folder) = folder {
            params.push(("folder", folder.to_string()));
        }
        let mut form = Form::new();
        for (k, v) in self.signed_params(params) {
            form = form.text(k, v);
        }
        let part = Part::bytes(image.body.to_vec())
            .file_name(image.file_name.clone())
            .mime_str(&image.content_type)
            .context("cloudinary upload content type")?;
        form = form.part("file", part);

        let res = self
            .http
            .post(format!("{}/upload", self.endpoint))
            .multipart(form)
            .send()
            .await
            .context("cloudinary upload request")?;
        let res = self.check(res, "upload").await?;
        let body: UploadResponse = res.json().await.context("cloudinary upload response")?;

        match (body.secure_url, body.public_id) {
            (Some(url), Some(asset_id)) if !url.is_empty() && !asset_id.is_empty() => {
                debug!(%asset_id, "cloudinary upload ok");
                Ok(UploadedAsset { url, asset_id })
            }
            _ => anyhow::bail!("cloudinary upload response is missing secure_url or public_id"),
        }
    }

    async fn destroy(&self, asset_id: &str) -> anyhow::Result<()> {
        let params = self.signed_params(vec![("public_id", asset_id.to_string())]);
        let res = self
            .http
            .post(format!("{}/destroy", self.endpoint))
            .form(&params)
            .send()
            .await
            .context("cloudinary destroy request")?;
        let res = self.check(res, "destroy").await?;
        let body: DestroyResponse = res.json().await.context("cloudinary destroy response")?;
        match body.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                warn!(%asset_id, "cloudinary asset already gone");
                Ok(())
            }
            other => anyhow::bail!("cloudinary destroy returned `{}`", other),
        }
    }
}
