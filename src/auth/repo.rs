use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::repo_types::{GenerationRecord, GenerationRecordRow, NewGenerationRecord, User};

/// Returned by [`UserRepo::create`] when the email already has an account.
#[derive(Debug, thiserror::Error)]
#[error("email already registered")]
pub struct EmailTaken;

/// Persistence for the user aggregate, including its generation history.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a new user with hashed password.
    async fn create(&self, email: &str, password_hash: &str, name: &str) -> anyhow::Result<User>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Returns `None` when the user does not exist.
    async fn update_name(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>>;
    /// Appends to the end of the user's history.
    async fn append_generation(
        &self,
        user_id: Uuid,
        record: NewGenerationRecord,
    ) -> anyhow::Result<GenerationRecord>;
    /// History in insertion order, oldest first.
    async fn list_generations(&self, user_id: Uuid) -> anyhow::Result<Vec<GenerationRecord>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn create(&self, email: &str, password_hash: &str, name: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, name, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| -> anyhow::Error {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return EmailTaken.into();
                }
            }
            anyhow::Error::new(e).context("insert user")
        })?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT id, email, password_hash, name, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn update_name(&self, id: Uuid, name: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, email, password_hash, name, created_at
            "#,
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.db)
        .await
        .context("update user name")?;
        Ok(user)
    }

    async fn append_generation(
        &self,
        user_id: Uuid,
        record: NewGenerationRecord,
    ) -> anyhow::Result<GenerationRecord> {
        let row = sqlx::query_as::<_, GenerationRecordRow>(
            r#"
            INSERT INTO generation_records
                (user_id, sketch_image, generated_image, title, description, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, sketch_image, generated_image, title, description,
                      category, status, created_at
            "#,
        )
        .bind(user_id)
        .bind(&record.sketch_image)
        .bind(&record.generated_image)
        .bind(&record.title)
        .bind(&record.description)
        .bind(record.category.as_str())
        .fetch_one(&self.db)
        .await
        .context("insert generation record")?;
        row.try_into()
    }

    async fn list_generations(&self, user_id: Uuid) -> anyhow::Result<Vec<GenerationRecord>> {
        let rows = sqlx::query_as::<_, GenerationRecordRow>(
            r#"
            SELECT id, sketch_image, generated_image, title, description,
                   category, status, created_at
              FROM generation_records
             WHERE user_id = $1
             ORDER BY seq ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list generation records")?;
        rows.into_iter().map(GenerationRecord::try_from).collect()
    }
}
