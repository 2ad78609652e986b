use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{
    ApprovedDesign, ApprovedDesignRow, Design, DesignChanges, DesignRow, NewDesign,
};

#[async_trait]
pub trait DesignRepo: Send + Sync {
    async fn insert(&self, design: NewDesign) -> anyhow::Result<Design>;
    /// Newest first.
    async fn list_by_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<Design>>;
    /// Approved designs only, newest first.
    async fn list_approved(&self) -> anyhow::Result<Vec<ApprovedDesign>>;
    /// `None` when the design does not exist or belongs to someone else.
    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Design>>;
    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: &DesignChanges,
    ) -> anyhow::Result<Option<Design>>;
    /// Returns whether a row was removed.
    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgDesignRepo {
    db: PgPool,
}

impl PgDesignRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const DESIGN_COLUMNS: &str = "id, user_id, title, description, category, image_url, asset_id, \
                              status, created_at, updated_at";

#[async_trait]
impl DesignRepo for PgDesignRepo {
    async fn insert(&self, design: NewDesign) -> anyhow::Result<Design> {
        let row = sqlx::query_as::<_, DesignRow>(&format!(
            r#"
            INSERT INTO designs (user_id, title, description, category, image_url, asset_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {DESIGN_COLUMNS}
            "#
        ))
        .bind(design.user_id)
        .bind(&design.title)
        .bind(&design.description)
        .bind(design.category.as_str())
        .bind(&design.image_url)
        .bind(&design.asset_id)
        .fetch_one(&self.db)
        .await
        .context("insert design")?;
        row.try_into()
    }

    async fn list_by_owner(&self, user_id: Uuid) -> anyhow::Result<Vec<Design>> {
        let rows = sqlx::query_as::<_, DesignRow>(&format!(
            r#"
            SELECT {DESIGN_COLUMNS}
              FROM designs
             WHERE user_id = $1
             ORDER BY created_at DESC, seq DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .context("list designs by owner")?;
        rows.into_iter().map(Design::try_from).collect()
    }

    async fn list_approved(&self) -> anyhow::Result<Vec<ApprovedDesign>> {
        let rows = sqlx::query_as::<_, ApprovedDesignRow>(
            r#"
            SELECT d.id, d.user_id, u.name AS owner_name, d.title, d.description,
                   d.category, d.image_url, d.status, d.created_at
              FROM designs d
              JOIN users u ON u.id = d.user_id
             WHERE d.status = 'approved'
             ORDER BY d.created_at DESC, d.seq DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list approved designs")?;
        rows.into_iter().map(ApprovedDesign::try_from).collect()
    }

    async fn find_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Design>> {
        let row = sqlx::query_as::<_, DesignRow>(&format!(
            r#"SELECT {DESIGN_COLUMNS} FROM designs WHERE id = $1 AND user_id = $2"#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .context("find design")?;
        row.map(Design::try_from).transpose()
    }

    async fn update_owned(
        &self,
        id: Uuid,
        user_id: Uuid,
        changes: &DesignChanges,
    ) -> anyhow::Result<Option<Design>> {
        let row = sqlx::query_as::<_, DesignRow>(&format!(
            r#"
            UPDATE designs
               SET title = COALESCE($3, title),
                   description = COALESCE($4, description),
                   category = COALESCE($5, category),
                   updated_at = now()
             WHERE id = $1 AND user_id = $2
            RETURNING {DESIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(changes.title.as_deref())
        .bind(changes.description.as_deref())
        .bind(changes.category.map(|c| c.as_str()))
        .fetch_optional(&self.db)
        .await
        .context("update design")?;
        row.map(Design::try_from).transpose()
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query(r#"DELETE FROM designs WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete design")?;
        Ok(res.rows_affected() > 0)
    }
}
