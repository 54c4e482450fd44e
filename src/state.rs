use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::AppConfig;
use crate::images::store::ImageStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub images: Arc<ImageStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        // Lazy pool: the server must come up and start listening even when
        // the database is unreachable; affected requests fail individually.
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(&config.database_url)
            .context("invalid database url")?;

        match sqlx::query("SELECT 1").execute(&db).await {
            Ok(_) => tracing::info!("database connected"),
            Err(e) => {
                tracing::error!(error = %e, "database connection failed; continuing anyway")
            }
        }

        let images = Arc::new(
            ImageStore::new(config.upload_dir.as_str(), "/uploads")
                .context("create upload directory")?,
        );

        Ok(Self {
            db,
            config,
            images,
        })
    }
}
