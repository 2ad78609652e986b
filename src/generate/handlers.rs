use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{repo_types::GenerationRecord, AuthUser},
    error::ApiError,
    state::AppState,
    uploads::read_spooled_form,
};

use super::{
    dto::{GenerationRequest, GenerationResponse},
    services::GenerationService,
};

const FORM_OVERHEAD: usize = 64 * 1024;
const GENERATE_FAILED: &str = "Error generating image";

pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/generate/image", post(generate_image))
        .route("/generate/history", get(history))
        .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD))
}

/// POST /generate/image (multipart: image, optional prompt/title/description/category)
#[instrument(skip(svc, mp))]
pub async fn generate_image(
    State(svc): State<GenerationService>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<Json<GenerationResponse>, ApiError> {
    let (fields, sketch) =
        read_spooled_form(&mut mp, "image", svc.upload_dir(), svc.max_upload_bytes())
            .await
            .map_err(|e| e.echoed(GENERATE_FAILED))?;
    let req = GenerationRequest::from_fields(fields).map_err(|e| e.echoed(GENERATE_FAILED))?;
    let res = svc
        .generate(user_id, sketch, req)
        .await
        .map_err(|e| e.echoed(GENERATE_FAILED))?;
    Ok(Json(res))
}

#[instrument(skip(svc))]
pub async fn history(
    State(svc): State<GenerationService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<GenerationRecord>>, ApiError> {
    let records = svc
        .history(user_id)
        .await
        .map_err(|e| e.masked("Error fetching history"))?;
    Ok(Json(records))
}
