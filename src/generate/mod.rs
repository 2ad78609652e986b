mod dto;
pub mod handlers;
pub mod services;

use axum::Router;

use crate::state::AppState;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::routes(max_upload_bytes)
}
