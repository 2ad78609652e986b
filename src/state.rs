use std::{sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::{
    assets::{self, AssetHost},
    auth::repo::{PgUserRepo, UserRepo},
    config::AppConfig,
    designs::repo::{DesignRepo, PgDesignRepo},
    imagegen::{ImageGenerator, OpenAiImageGenerator},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub designs: Arc<dyn DesignRepo>,
    pub assets: Arc<dyn AssetHost>,
    pub generator: Arc<dyn ImageGenerator>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to postgres")?;
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;
        info!("database ready");

        let timeout = Duration::from_secs(config.external_timeout_secs);
        let assets = assets::from_config(&config.assets, timeout).await?;
        let generator =
            Arc::new(OpenAiImageGenerator::new(&config.openai, timeout)?) as Arc<dyn ImageGenerator>;

        Ok(Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            designs: Arc::new(PgDesignRepo::new(db)),
            config,
            assets,
            generator,
        })
    }

    #[cfg(test)]
    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        designs: Arc<dyn DesignRepo>,
        assets: Arc<dyn AssetHost>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            config,
            users,
            designs,
            assets,
            generator,
        }
    }
}

#[cfg(test)]
impl AppState {
    /// In-memory state with fake collaborators.
    pub fn fake() -> Self {
        crate::testing::Harness::new().state
    }
}
