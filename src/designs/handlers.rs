use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, AppError},
    state::AppState,
    uploads::read_image_form,
};

use super::{
    dto::{MessageResponse, SubmitDesign},
    repo_types::{ApprovedDesign, Design},
    services::DesignService,
};

const FORM_OVERHEAD: usize = 64 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/designs/my-designs", get(list_own))
        .route("/designs/approved", get(list_approved))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/designs", post(submit))
        .route("/designs/:id", patch(update).delete(delete))
        .layer(DefaultBodyLimit::max(max_upload_bytes + FORM_OVERHEAD))
}

/// POST /designs (multipart: title, description, category, image)
#[instrument(skip(svc, mp))]
pub async fn submit(
    State(svc): State<DesignService>,
    AuthUser(user_id): AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<Design>), ApiError> {
    const MSG: &str = "Error uploading design";
    let (fields, image) = read_image_form(&mut mp, "image", svc.max_upload_bytes())
        .await
        .map_err(|e| e.masked(MSG))?;
    let submission = SubmitDesign::from_fields(&fields).map_err(|e| e.masked(MSG))?;
    let design = svc
        .submit(user_id, submission, image)
        .await
        .map_err(|e| e.masked(MSG))?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/designs/{}", design.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(design)))
}

#[instrument(skip(svc))]
pub async fn list_own(
    State(svc): State<DesignService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Design>>, ApiError> {
    let designs = svc
        .list_own(user_id)
        .await
        .map_err(|e| e.masked("Error fetching designs"))?;
    Ok(Json(designs))
}

#[instrument(skip(svc))]
pub async fn list_approved(
    State(svc): State<DesignService>,
) -> Result<Json<Vec<ApprovedDesign>>, ApiError> {
    let designs = svc
        .list_approved()
        .await
        .map_err(|e| e.masked("Error fetching designs"))?;
    Ok(Json(designs))
}

/// A malformed id cannot name any design.
fn design_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, AppError> {
    id.map(|Path(id)| id).map_err(|_| AppError::NotFound("Design"))
}

#[instrument(skip(svc, id, body))]
pub async fn update(
    State(svc): State<DesignService>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Design>, ApiError> {
    const MSG: &str = "Error updating design";
    let id = design_id(id).map_err(|e| e.masked(MSG))?;
    // an unreadable body is judged after the ownership check, like a bad field set
    let body = body.map(|Json(v)| v).unwrap_or_else(|rejection| {
        warn!(%rejection, "unreadable design update body");
        Value::Null
    });
    let design = svc
        .update(id, user_id, &body)
        .await
        .map_err(|e| e.masked(MSG))?;
    Ok(Json(design))
}

#[instrument(skip(svc, id))]
pub async fn delete(
    State(svc): State<DesignService>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = design_id(id).map_err(|e| e.masked("Error deleting design"))?;
    svc.delete(id, user_id)
        .await
        .map_err(|e| e.masked("Error deleting design"))?;
    Ok(Json(MessageResponse {
        message: "Design deleted successfully",
    }))
}
