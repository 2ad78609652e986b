use serde::Serialize;

use crate::{
    auth::repo_types::GenerationRecord,
    error::AppError,
    types::Category,
    uploads::{non_empty, TextFields},
};

/// Optional text fields sent alongside the sketch. Blank values count as absent.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
}

impl GenerationRequest {
    pub fn from_fields(mut fields: TextFields) -> Result<Self, AppError> {
        let category = match non_empty(fields.remove("category")) {
            Some(c) => Some(
                c.parse::<Category>()
                    .map_err(|e| AppError::validation(e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            prompt: non_empty(fields.remove("prompt")),
            title: non_empty(fields.remove("title")),
            description: non_empty(fields.remove("description")),
            category,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    pub original_image: String,
    pub generated_image: String,
    pub design: GenerationRecord,
}
