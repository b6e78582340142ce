pub mod app;
pub mod cache;
pub mod comments;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod films;
pub mod models;
pub mod routes;
pub mod store;
pub mod sync;

use std::sync::Arc;

pub use app::{AppState, router};
pub use config::Config;

use crate::{
    cache::DbCache,
    config::CacheBackendKind,
    films::WarmOutcome,
    models::SyncReport,
    sync::SwapiClient,
};

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let db = db::connect_and_migrate(&config.database_url, config.database_max_connections).await?;

    if config.cache_backend == CacheBackendKind::Database {
        match DbCache::new(db.clone()).purge_expired().await {
            Ok(purged) => tracing::debug!(purged, "dropped expired cache rows"),
            Err(err) => tracing::warn!(error = %err, "could not purge expired cache rows"),
        }
    }

    let state = Arc::new(AppState::new(config.clone(), db));

    if config.warm_cache {
        match state.films.warm().await {
            Ok(WarmOutcome::Populated(count)) => tracing::info!(count, "film list cache ready"),
            Ok(WarmOutcome::AlreadyCached) => tracing::info!("film list cache already populated"),
            Ok(WarmOutcome::NoFilms) => {
                tracing::warn!("no films in database, run `filmnotes sync` to import them")
            },
            Err(err) => tracing::warn!(error = %err, "could not warm film list cache"),
        }
    }

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs one catalog sync against `config.catalog_url`.
pub async fn run_sync(config: Config) -> anyhow::Result<SyncReport> {
    let http = reqwest::Client::builder()
        .user_agent("filmnotes/0.1")
        .timeout(config.http_timeout)
        .build()?;

    let db = db::connect_and_migrate(&config.database_url, config.database_max_connections).await?;
    let cache = app::build_cache(&config, &db);
    if config.cache_backend == CacheBackendKind::Memory {
        tracing::warn!("memory cache backend: a running server keeps its cached list until it expires");
    }

    let store = store::FilmStore::new(db);
    let source = SwapiClient::new(http, config.catalog_url.clone());
    Ok(sync::sync_catalog(&store, &cache, &source).await?)
}
