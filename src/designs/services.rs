use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::extract::FromRef;
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    assets::{self, AssetHost, DESIGNS_FOLDER},
    error::{with_timeout, AppError},
    state::AppState,
    uploads::ImageUpload,
};

use super::{
    dto::{parse_changes, SubmitDesign},
    repo::DesignRepo,
    repo_types::{ApprovedDesign, Design, NewDesign},
};

/// Design record pipeline: submission, listings, owner edits and removal.
#[derive(Clone)]
pub struct DesignService {
    repo: Arc<dyn DesignRepo>,
    assets: Arc<dyn AssetHost>,
    max_upload_bytes: usize,
    timeout: Duration,
}

impl FromRef<AppState> for DesignService {
    fn from_ref(state: &AppState) -> Self {
        Self {
            repo: state.designs.clone(),
            assets: state.assets.clone(),
            max_upload_bytes: state.config.uploads.max_bytes,
            timeout: Duration::from_secs(state.config.external_timeout_secs),
        }
    }
}

impl DesignService {
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    #[instrument(skip(self, submission, image), fields(title = %submission.title))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        submission: SubmitDesign,
        image: Option<ImageUpload>,
    ) -> Result<Design, AppError> {
        let image = image.ok_or_else(|| AppError::validation("No image file uploaded"))?;
        image.validate(self.max_upload_bytes)?;

        let asset = with_timeout(
            self.timeout,
            "asset upload",
            self.assets.upload(Some(DESIGNS_FOLDER), &image),
        )
        .await
        .context("upload design image")
        .map_err(AppError::Upload)?;

        let new = NewDesign {
            user_id,
            title: submission.title,
            description: submission.description,
            category: submission.category,
            image_url: asset.url.clone(),
            asset_id: asset.asset_id.clone(),
        };
        let design = match self.repo.insert(new).await {
            Ok(d) => d,
            Err(e) => {
                error!(error = %e, asset_id = %asset.asset_id, "insert design failed");
                assets::discard(self.assets.as_ref(), &asset, self.timeout).await;
                return Err(AppError::Persist(e));
            }
        };
        info!(design_id = %design.id, asset_id = %design.asset_id, "design submitted");
        Ok(design)
    }

    pub async fn list_own(&self, user_id: Uuid) -> Result<Vec<Design>, AppError> {
        self.repo
            .list_by_owner(user_id)
            .await
            .map_err(AppError::Persist)
    }

    pub async fn list_approved(&self) -> Result<Vec<ApprovedDesign>, AppError> {
        self.repo.list_approved().await.map_err(AppError::Persist)
    }

    /// Ownership is checked before the field set, so a foreign id is always NotFound.
    #[instrument(skip(self, body))]
    pub async fn update(
        &self,
        id: Uuid,
        user_id: Uuid,
        body: &Value,
    ) -> Result<Design, AppError> {
        let current = self
            .repo
            .find_owned(id, user_id)
            .await
            .map_err(AppError::Persist)?
            .ok_or(AppError::NotFound("Design"))?;

        let changes = parse_changes(body)?;
        if changes.is_empty() {
            return Ok(current);
        }

        let design = self
            .repo
            .update_owned(id, user_id, &changes)
            .await
            .map_err(AppError::Persist)?
            .ok_or(AppError::NotFound("Design"))?;
        info!(design_id = %design.id, "design updated");
        Ok(design)
    }

    /// Evicts the remote asset, then removes the record. A failed eviction keeps the record.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        let design = self
            .repo
            .find_owned(id, user_id)
            .await
            .map_err(AppError::Persist)?
            .ok_or(AppError::NotFound("Design"))?;

        with_timeout(
            self.timeout,
            "asset destroy",
            self.assets.destroy(&design.asset_id),
        )
        .await
        .with_context(|| format!("destroy asset {}", design.asset_id))
        .map_err(AppError::Upload)?;

        if !self
            .repo
            .delete_owned(id, user_id)
            .await
            .map_err(AppError::Persist)?
        {
            warn!(design_id = %id, "design vanished during delete");
            return Err(AppError::NotFound("Design"));
        }
        info!(design_id = %id, asset_id = %design.asset_id, "design deleted");
        Ok(())
    }
}
