//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::media::{LocalFileStorage, MediaService};
use crate::settings::Settings;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool.
    db: PgPool,

    /// Process configuration.
    config: Config,

    /// Blog settings facade (defaults + host overrides), threaded into
    /// every entry point that needs it — there is no global registry.
    settings: Settings,

    /// Content-addressed media ingestion.
    media: MediaService,
}

impl AppState {
    /// Initialize state: connect to the database, run migrations, build
    /// the settings facade and media service.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&db)
            .await
            .context("failed to run migrations")?;

        // A typo'd override key is a deployment error; fail startup loudly.
        let settings = Settings::with_overrides(config.blog_setting_overrides.clone())
            .context("invalid BLOG_SETTINGS override")?;

        let storage = Arc::new(LocalFileStorage::new(
            config.uploads_dir.clone(),
            config.files_url.clone(),
        ));
        let media = MediaService::new(db.clone(), storage, settings.clone());

        info!(
            overrides = config.blog_setting_overrides.len(),
            "application state initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                db,
                config: config.clone(),
                settings,
                media,
            }),
        })
    }

    /// The database pool.
    pub fn db(&self) -> &PgPool {
        &self.inner.db
    }

    /// The process configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The blog settings facade.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// The media service.
    pub fn media(&self) -> &MediaService {
        &self.inner.media
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish()
    }
}
