use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, Context};
use axum::extract::FromRef;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    assets::{self, AssetHost},
    auth::{
        repo::UserRepo,
        repo_types::{GenerationRecord, NewGenerationRecord},
    },
    error::{with_timeout, AppError},
    imagegen::ImageGenerator,
    state::AppState,
    uploads::TempUpload,
};

use super::dto::{GenerationRequest, GenerationResponse};

pub const DEFAULT_PROMPT: &str =
    "Transform this jewelry sketch into a realistic, detailed 3D render";
pub const DEFAULT_TITLE: &str = "Untitled Design";

pub fn compose_prompt(prompt: &str, sketch_url: &str) -> String {
    format!(
        "{prompt}. The image should be a photorealistic jewelry design based on this sketch: {sketch_url}"
    )
}

/// Sketch to render pipeline. Each request runs upload, generate and persist in order.
#[derive(Clone)]
pub struct GenerationService {
    users: Arc<dyn UserRepo>,
    assets: Arc<dyn AssetHost>,
    generator: Arc<dyn ImageGenerator>,
    upload_dir: PathBuf,
    max_upload_bytes: usize,
    timeout: Duration,
}

impl FromRef<AppState> for GenerationService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            users: state.users.clone(),
            assets: state.assets.clone(),
            generator: state.generator.clone(),
            upload_dir: state.config.uploads.dir.clone(),
            max_upload_bytes: state.config.uploads.max_bytes,
            timeout: Duration::from_secs(state.config.external_timeout_secs),
        }
    }
}

impl GenerationService {
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// The spooled sketch is removed before this returns, whatever the outcome.
    #[instrument(skip(self, sketch, req))]
    pub async fn generate(
        &self,
        user_id: Uuid,
        sketch: Option<TempUpload>,
        req: GenerationRequest,
    ) -> Result<GenerationResponse, AppError> {
        let sketch = sketch.ok_or_else(|| AppError::validation("No image file uploaded"))?;
        sketch.validate(self.max_upload_bytes)?;

        self.users
            .find_by_id(user_id)
            .await
            .map_err(AppError::Persist)?
            .ok_or(AppError::NotFound("User"))?;

        let image = sketch.load().await.map_err(AppError::Upload)?;
        let uploaded = with_timeout(self.timeout, "asset upload", self.assets.upload(None, &image))
            .await
            .context("upload sketch")
            .map_err(AppError::Upload)?;
        sketch.remove();
        info!(asset_id = %uploaded.asset_id, "sketch uploaded");

        let prompt = req.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string());
        let composed = compose_prompt(&prompt, &uploaded.url);
        let generated = with_timeout(
            self.timeout,
            "image generation",
            self.generator.generate(&composed),
        )
        .await
        .and_then(|url| {
            if url.trim().is_empty() {
                Err(anyhow!("Failed to generate image: no URL returned"))
            } else {
                Ok(url)
            }
        });
        let generated = match generated {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "image generation failed");
                assets::discard(self.assets.as_ref(), &uploaded, self.timeout).await;
                return Err(AppError::Generation(e));
            }
        };

        let record = NewGenerationRecord {
            sketch_image: uploaded.url.clone(),
            generated_image: generated.clone(),
            title: req.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: req.description.unwrap_or(prompt),
            category: req.category.unwrap_or_default(),
        };
        let design = match self.users.append_generation(user_id, record).await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "append generation record failed");
                assets::discard(self.assets.as_ref(), &uploaded, self.timeout).await;
                return Err(AppError::Persist(e));
            }
        };
        info!(record_id = %design.id, "generation recorded");

        Ok(GenerationResponse {
            original_image: uploaded.url,
            generated_image: generated,
            design,
        })
    }

    /// Newest first.
    pub async fn history(&self, user_id: Uuid) -> Result<Vec<GenerationRecord>, AppError> {
        let mut records = self
            .users
            .list_generations(user_id)
            .await
            .map_err(AppError::Persist)?;
        records.reverse();
        Ok(records)
    }
}
