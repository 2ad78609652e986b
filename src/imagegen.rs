use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OpenAiConfig;

pub const IMAGE_SIZE: &str = "1024x1024";

/// External text-to-image service. Returns the URL of one generated image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize)]
struct ImagesRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: Option<OpenAiError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: Option<String>,
}

pub struct OpenAiImageGenerator {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiImageGenerator {
    pub fn new(cfg: &OpenAiConfig, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build openai http client")?;
        Ok(Self {
            http,
            url: format!("{}/images/generations", cfg.api_base.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.image_model.clone(),
        })
    }
}

fn parse_openai_error(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiErrorResponse>(body)
        .ok()?
        .error?
        .message
        .filter(|m| !m.trim().is_empty())
}

fn first_url(resp: ImagesResponse) -> anyhow::Result<String> {
    resp.data
        .into_iter()
        .next()
        .and_then(|d| d.url)
        .filter(|url| !url.trim().is_empty())
        .context("Failed to generate image: no URL returned")
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = ImagesRequest {
            model: &self.model,
            prompt,
            n: 1,
            size: IMAGE_SIZE,
        };
        let res = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("image generation request")?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            let message = parse_openai_error(&text).unwrap_or_else(|| text.trim().to_string());
            anyhow::bail!("image generation failed with status {}: {}", status, message);
        }

        let parsed: ImagesResponse = res.json().await.context("image generation response")?;
        let url = first_url(parsed)?;
        debug!(model = %self.model, "image generated");
        Ok(url)
    }
}
