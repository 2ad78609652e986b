use std::{collections::HashMap, path::Path};

use anyhow::Context;
use axum::extract::{multipart::Field, Multipart};
use bytes::{Bytes, BytesMut};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::AppError;

pub const ALLOWED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Non-file multipart fields, keyed by field name.
pub type TextFields = HashMap<String, String>;

/// An image received in memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

impl ImageUpload {
    pub fn validate(&self, max_bytes: usize) -> Result<(), AppError> {
        check_image(&self.file_name, self.body.len(), max_bytes)
    }

    pub fn extension(&self) -> Option<String> {
        extension_of(&self.file_name)
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn check_image(file_name: &str, len: usize, max_bytes: usize) -> Result<(), AppError> {
    let allowed = extension_of(file_name)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false);
    if !allowed {
        return Err(AppError::validation("Please upload an image file (jpg, jpeg or png)"));
    }
    if len == 0 {
        return Err(AppError::validation("Uploaded image is empty"));
    }
    if len > max_bytes {
        return Err(AppError::validation(format!(
            "Image exceeds the {} byte limit",
            max_bytes
        )));
    }
    Ok(())
}

pub fn mime_from_ext(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// A sketch spooled to the upload directory. The file is removed when this is dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: TempPath,
    file: tokio::fs::File,
    file_name: String,
    content_type: String,
    len: usize,
}

impl TempUpload {
    pub async fn create_in(dir: &Path, file_name: &str, content_type: &str) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create upload dir {}", dir.display()))?;
        let suffix = extension_of(file_name)
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let named = tempfile::Builder::new()
            .prefix("sketch-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .context("create temp upload")?;
        let (file, path) = named.into_parts();
        debug!(path = %path.display(), "spooling upload");
        Ok(Self {
            path,
            file: tokio::fs::File::from_std(file),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            len: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8], max_bytes: usize) -> Result<(), AppError> {
        if self.len + chunk.len() > max_bytes {
            return Err(AppError::validation(format!(
                "Image exceeds the {} byte limit",
                max_bytes
            )));
        }
        self.file
            .write_all(chunk)
            .await
            .context("write temp upload")
            .map_err(AppError::Upload)?;
        self.len += chunk.len();
        Ok(())
    }

    pub async fn finish(&mut self) -> anyhow::Result<()> {
        self.file.flush().await.context("flush temp upload")
    }

    pub fn validate(&self, max_bytes: usize) -> Result<(), AppError> {
        check_image(&self.file_name, self.len, max_bytes)
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> anyhow::Result<ImageUpload> {
        let body = tokio::fs::read(&*self.path)
            .await
            .with_context(|| format!("read temp upload {}", self.path.display()))?;
        Ok(ImageUpload {
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            body: Bytes::from(body),
        })
    }

    /// Removes the spooled file now instead of on drop.
    pub fn remove(self) {
        let Self { path, file, .. } = self;
        drop(file);
        let shown = path.display().to_string();
        if let Err(e) = path.close() {
            warn!(error = %e, path = %shown, "failed to remove temp upload");
        }
    }
}

fn content_type_of(field: &Field<'_>, file_name: &str) -> String {
    field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            mime_from_ext(extension_of(file_name).as_deref().unwrap_or_default()).to_string()
        })
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::validation(format!("Invalid multipart body: {}", e.body_text()))
}

/// Reads a form whose `file_field` is buffered in memory, capped at `max_bytes`.
pub async fn read_image_form(
    mp: &mut Multipart,
    file_field: &str,
    max_bytes: usize,
) -> Result<(TextFields, Option<ImageUpload>), AppError> {
    let mut fields = TextFields::new();
    let mut image = None;
    while let Some(mut field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = content_type_of(&field, &file_name);
            let mut body = BytesMut::new();
            while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
                if body.len() + chunk.len() > max_bytes {
                    return Err(AppError::validation(format!(
                        "Image exceeds the {} byte limit",
                        max_bytes
                    )));
                }
                body.extend_from_slice(&chunk);
            }
            image = Some(ImageUpload {
                file_name,
                content_type,
                body: body.freeze(),
            });
        } else {
            let text = field.text().await.map_err(bad_multipart)?;
            fields.insert(name, text);
        }
    }
    Ok((fields, image))
}

/// Reads a form whose `file_field` is streamed into a [`TempUpload`] under `dir`.
pub async fn read_spooled_form(
    mp: &mut Multipart,
    file_field: &str,
    dir: &Path,
    max_bytes: usize,
) -> Result<(TextFields, Option<TempUpload>), AppError> {
    let mut fields = TextFields::new();
    let mut spooled = None;
    while let Some(mut field) = mp.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = content_type_of(&field, &file_name);
            let mut temp = TempUpload::create_in(dir, &file_name, &content_type)
                .await
                .map_err(AppError::Upload)?;
            while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
                temp.write_chunk(&chunk, max_bytes).await?;
            }
            temp.finish().await.map_err(AppError::Upload)?;
            spooled = Some(temp);
        } else {
            let text = field.text().await.map_err(bad_multipart)?;
            fields.insert(name, text);
        }
    }
    Ok((fields, spooled))
}

/// Empty and whitespace-only values count as absent.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
