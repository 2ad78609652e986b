use serde::Serialize;
use serde_json::Value;

use crate::{error::AppError, types::Category, uploads::TextFields};

use super::repo_types::DesignChanges;

/// Fields an owner may change through PATCH.
pub const EDITABLE_FIELDS: [&str; 3] = ["title", "description", "category"];

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// Text half of a design submission.
#[derive(Debug, Clone)]
pub struct SubmitDesign {
    pub title: String,
    pub description: String,
    pub category: Category,
}

impl SubmitDesign {
    pub fn from_fields(fields: &TextFields) -> Result<Self, AppError> {
        let title = required(fields, "title")?;
        let description = required(fields, "description")?;
        let category = required(fields, "category")?
            .parse::<Category>()
            .map_err(|e| AppError::validation(e.to_string()))?;
        Ok(Self {
            title,
            description,
            category,
        })
    }
}

fn required(fields: &TextFields, name: &str) -> Result<String, AppError> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::validation(format!("{name} is required")))
}

/// Parses a PATCH body. Any key outside [`EDITABLE_FIELDS`] rejects the whole update,
/// as does a body that is not a JSON object.
pub fn parse_changes(body: &Value) -> Result<DesignChanges, AppError> {
    let Some(body) = body.as_object() else {
        return Err(AppError::validation("Invalid updates"));
    };
    if body.keys().any(|k| !EDITABLE_FIELDS.contains(&k.as_str())) {
        return Err(AppError::validation("Invalid updates"));
    }
    let mut changes = DesignChanges::default();
    for (key, value) in body {
        let text = value
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::validation(format!("{key} must be a non-empty string")))?;
        match key.as_str() {
            "title" => changes.title = Some(text.to_string()),
            "description" => changes.description = Some(text.to_string()),
            "category" => {
                let category = text
                    .parse::<Category>()
                    .map_err(|e| AppError::validation(e.to_string()))?;
                changes.category = Some(category);
            }
            _ => return Err(AppError::validation("Invalid updates")),
        }
    }
    Ok(changes)
}
