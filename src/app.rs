use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    cache::{DbCache, ResponseCache},
    comments::CommentService,
    config::{CacheBackendKind, Config},
    error::{ErrorBody, ErrorDetail},
    films::FilmQueries,
    routes,
    store::FilmStore,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: FilmStore,
    pub cache: ResponseCache,
    pub films: FilmQueries,
    pub comments: CommentService,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection) -> Self {
        let cache = build_cache(&config, &db);
        let store = FilmStore::new(db);
        Self {
            films: FilmQueries::new(store.clone(), cache.clone()),
            comments: CommentService::new(store.clone(), cache.clone()),
            config,
            store,
            cache,
        }
    }
}

pub fn build_cache(config: &Config, db: &DatabaseConnection) -> ResponseCache {
    match config.cache_backend {
        CacheBackendKind::Memory => ResponseCache::in_memory(config.cache_ttl),
        CacheBackendKind::Database => {
            ResponseCache::new(Arc::new(DbCache::new(db.clone())), config.cache_ttl)
        },
    }
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/films/", get(routes::list_films))
        .route("/films/{id}/", get(routes::film_detail))
        .route("/films/{id}/comments/", get(routes::film_comments))
        .route("/comments/", post(routes::create_comment))
        .route("/health/", get(routes::health))
}

/// Routes are served at the root and mirrored under `/api`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .layer(middleware::from_fn_with_state(state.clone(), expose_error_detail))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// Puts the real message back into server error bodies when the deployment
/// allows it.
async fn expose_error_detail(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut resp = next.run(req).await;
    if !state.config.expose_error_details {
        return resp;
    }
    let Some(detail) = resp.extensions_mut().remove::<ErrorDetail>() else {
        return resp;
    };
    let body = ErrorBody { error: detail.kind, detail: detail.message };
    (resp.status(), Json(body)).into_response()
}
