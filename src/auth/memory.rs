//! In-memory user store for tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{EmailTaken, UserRepo},
        repo_types::{GenerationRecord, NewGenerationRecord, User},
    },
    types::ApprovalStatus,
};

#[derive(Debug, Default)]
pub struct MemoryUserRepo {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    history: Arc<RwLock<HashMap<Uuid, Vec<GenerationRecord>>>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn name_of(&self, id: Uuid) -> Option<String> {
        self.users.read().await.get(&id).map(|u| u.name.clone())
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(&self, email: &str, password_hash: &str, name: &str) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(EmailTaken.into());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_name(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|u| {
            u.name = name.to_string();
            u.clone()
        }))
    }

    async fn append_generation(
        &self,
        user_id: Uuid,
        record: NewGenerationRecord,
    ) -> anyhow::Result<GenerationRecord> {
        if !self.users.read().await.contains_key(&user_id) {
            anyhow::bail!("user {} does not exist", user_id);
        }
        let record = GenerationRecord {
            id: Uuid::new_v4(),
            sketch_image: record.sketch_image,
            generated_image: record.generated_image,
            title: record.title,
            description: record.description,
            category: record.category,
            status: ApprovalStatus::Pending,
            created_at: OffsetDateTime::now_utc(),
        };
        self.history
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn list_generations(&self, user_id: Uuid) -> anyhow::Result<Vec<GenerationRecord>> {
        Ok(self
            .history
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
