use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{CachedJson, CommentView, CreateComment},
};

pub async fn list_films(State(state): State<Arc<AppState>>) -> AppResult<CachedJson> {
    state.films.list_films().await
}

pub async fn film_detail(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
) -> AppResult<CachedJson> {
    state.films.get_film(&external_id).await
}

pub async fn film_comments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<CommentView>>> {
    // non-numeric ids can never name a film
    let film_id: i32 = id.parse().map_err(|_| AppError::film_not_found(&id))?;
    Ok(Json(state.comments.list_comments(film_id).await?))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let req: CreateComment = serde_json::from_slice(&body)
        .map_err(|err| AppError::Validation(format!("invalid JSON body: {err}")))?;
    let created = state.comments.create_comment(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    database: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.store.ping().await {
        Ok(()) => {
            let body = Health { status: "healthy", database: "connected", error: None };
            (StatusCode::OK, Json(body)).into_response()
        },
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            let error = state.config.expose_error_details.then(|| err.to_string());
            let body = Health { status: "unhealthy", database: "disconnected", error };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        },
    }
}
