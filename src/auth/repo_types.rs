use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{ApprovalStatus, Category};

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String, // stored trimmed + lower-cased
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub name: String,
    pub created_at: OffsetDateTime,
}

/// One sketch → render result in a user's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRecord {
    pub id: Uuid,
    pub sketch_image: String,
    pub generated_image: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub status: ApprovalStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewGenerationRecord {
    pub sketch_image: String,
    pub generated_image: String,
    pub title: String,
    pub description: String,
    pub category: Category,
}

#[derive(Debug, FromRow)]
pub struct GenerationRecordRow {
    pub id: Uuid,
    pub sketch_image: String,
    pub generated_image: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<GenerationRecordRow> for GenerationRecord {
    type Error = anyhow::Error;

    fn try_from(r: GenerationRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            sketch_image: r.sketch_image,
            generated_image: r.generated_image,
            title: r.title,
            description: r.description,
            category: r.category.parse()?,
            status: r.status.parse()?,
            created_at: r.created_at,
        })
    }
}
