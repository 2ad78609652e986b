use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::{ApprovalStatus, Category};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Design {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub image_url: String,
    pub asset_id: String,
    #[serde(rename = "user")]
    pub user_id: Uuid,
    pub status: ApprovalStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignOwner {
    pub id: Uuid,
    pub name: String,
}

/// Approved design with the owner's display name joined in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedDesign {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub image_url: String,
    pub user: DesignOwner,
    pub status: ApprovalStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewDesign {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub image_url: String,
    pub asset_id: String,
}

/// Owner-editable subset of a design. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
}

impl DesignChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.category.is_none()
    }

    #[cfg(test)]
    pub fn apply(&self, design: &mut Design) {
        if let Some(title) = &self.title {
            design.title = title.clone();
        }
        if let Some(description) = &self.description {
            design.description = description.clone();
        }
        if let Some(category) = self.category {
            design.category = category;
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DesignRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub asset_id: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ApprovedDesignRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub owner_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: String,
    pub status: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<DesignRow> for Design {
    type Error = anyhow::Error;

    fn try_from(r: DesignRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description,
            category: r.category.parse()?,
            image_url: r.image_url,
            asset_id: r.asset_id,
            user_id: r.user_id,
            status: r.status.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl TryFrom<ApprovedDesignRow> for ApprovedDesign {
    type Error = anyhow::Error;

    fn try_from(r: ApprovedDesignRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            title: r.title,
            description: r.description,
            category: r.category.parse()?,
            image_url: r.image_url,
            user: DesignOwner {
                id: r.user_id,
                name: r.owner_name,
            },
            status: r.status.parse()?,
            created_at: r.created_at,
        })
    }
}
