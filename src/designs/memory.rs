//! In-memory design store for tests.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::DesignRepo,
    repo_types::{ApprovedDesign, Design, DesignChanges, DesignOwner, NewDesign},
};
use crate::{auth::memory::MemoryUserRepo, types::ApprovalStatus};

/// Designs in insertion order. Owner names are looked up in the shared user store.
pub struct MemoryDesignRepo {
    users: Arc<MemoryUserRepo>,
    designs: RwLock<Vec<Design>>,
}

impl MemoryDesignRepo {
    pub fn new(users: Arc<MemoryUserRepo>) -> Self {
        Self {
            users,
            designs: RwLock::new(Vec::new()),
        }
    }

    /// Stands in for the moderation actor.
    pub async fn set_status(&self, id: Uuid, status: ApprovalStatus) {
        if let Some(d) = self.designs.write().await.iter_mut().find(|d| d.id == id) {
            d.status = status;
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<Design> {
        self.designs.read().await.iter().find(|d| d.id == id).cloned()
    }
}

#[async_trait]
impl DesignRepo for MemoryDesignRepo {
    async fn insert(&self, design: NewDesign) -> anyhow::Result<Design> {
        if self.users.name_of(design.user_id).await.is_none() {
            anyhow::bail!("owner {} does not exist", design.user_id);
        }
        let now = OffsetDateTime::now_utc();
        let design = Design {
            id: Uuid::new_v4(),
            title: design.title,
            description: design.description,
            category: design.category,
            image_url: design.image_url,
            asset_id: design.asset_id,
            user_id: design.user_id,
            status: ApprovalStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.designs.write().await.push(design.clone());
        Ok(design)
    }

    async fn list_by_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<Design>> {
        Ok(self
            .designs
            .read()
            .await
            .iter()
            .rev()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_approved(&self) -> anyhow::Result<Vec<ApprovedDesign>> {
        let approved: Vec<Design> = self
            .designs
            .read()
            .await
            .iter()
            .rev()
            .filter(|d| d.status == ApprovalStatus::Approved)
            .cloned()
            .collect();
        let mut out = Vec::with_capacity(approved.len());
        for d in approved {
            let name = self.users.name_of(d.user_id).await.unwrap_or_default();
            out.push(ApprovedDesign {
                id: d.id,
                title: d.title,
                description: d.description,
                category: d.category,
                image_url: d.image_url,
                user: DesignOwner {
                    id: d.user_id,
                    name,
                },
                status: d.status,
                created_at: d.created_at,
            });
        }
        Ok(out)
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Design>> {
        Ok(self
            .designs
            .read()
            .await
            .iter()
            .find(|d| d.id == id && d.user_id == user_id)
            .cloned())
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: &DesignChanges,
    ) -> anyhow::Result<Option<Design>> {
        let mut designs = self.designs.write().await;
        Ok(designs
            .iter_mut()
            .find(|d| d.id == id && d.user_id == user_id)
            .map(|d| {
                changes.apply(d);
                d.updated_at = OffsetDateTime::now_utc();
                d.clone()
            }))
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut designs = self.designs.write().await;
        let before = designs.len();
        designs.retain(|d| !(d.id == id && d.user_id == user_id));
        Ok(designs.len() < before)
    }
}
