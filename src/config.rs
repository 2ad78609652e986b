use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Where incoming sketches are spooled while a generation request runs.
    pub dir: PathBuf,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Prefix used to build the public URL of an uploaded object.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum AssetBackendConfig {
    S3(S3Config),
    Cloudinary(CloudinaryConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub image_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub http: HttpConfig,
    pub uploads: UploadConfig,
    pub external_timeout_secs: u64,
    pub assets: AssetBackendConfig,
    pub openai: OpenAiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).with_context(|| format!("{key} is not set"));
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str, default: i64| {
            lookup(key)
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(default)
        };

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: or("JWT_ISSUER", "jewelcraft"),
            audience: or("JWT_AUDIENCE", "jewelcraft-users"),
            ttl_minutes: parsed("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: parsed("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };
        let http = HttpConfig {
            host: or("APP_HOST", "0.0.0.0"),
            port: lookup("APP_PORT")
                .map(|v| v.parse::<u16>())
                .transpose()
                .context("APP_PORT must be a port number")?
                .unwrap_or(8080),
        };
        let uploads = UploadConfig {
            dir: PathBuf::from(or("UPLOAD_DIR", "uploads")),
            max_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };
        let external_timeout_secs = parsed("EXTERNAL_TIMEOUT_SECS", 60).max(1) as u64;

        let assets = match or("ASSET_BACKEND", "s3").as_str() {
            "s3" => {
                let endpoint = required("S3_ENDPOINT")?;
                let bucket = required("S3_BUCKET")?;
                let public_base_url = lookup("S3_PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("{}/{}", endpoint.trim_end_matches('/'), bucket));
                AssetBackendConfig::S3(S3Config {
                    access_key: required("S3_ACCESS_KEY")?,
                    secret_key: required("S3_SECRET_KEY")?,
                    region: or("S3_REGION", "us-east-1"),
                    endpoint,
                    bucket,
                    public_base_url,
                })
            }
            "cloudinary" => AssetBackendConfig::Cloudinary(CloudinaryConfig {
                cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
                api_base: or("CLOUDINARY_API_BASE", "https://api.cloudinary.com/v1_1"),
            }),
            other => anyhow::bail!("unknown ASSET_BACKEND `{other}` (expected s3 or cloudinary)"),
        };

        let openai = OpenAiConfig {
            api_key: required("OPENAI_API_KEY")?,
            api_base: or("OPENAI_API_BASE", "https://api.openai.com/v1"),
            image_model: or("OPENAI_IMAGE_MODEL", "dall-e-2"),
        };

        Ok(Self {
            database_url,
            jwt,
            http,
            uploads,
            external_timeout_secs,
            assets,
            openai,
        })
    }
}
