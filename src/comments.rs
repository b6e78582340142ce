use jiff::Timestamp;
use serde_json::Value;
use tracing::info;

use crate::{
    cache::{FILMS_LIST_KEY, ResponseCache},
    entities::{comment, film},
    error::{AppError, AppResult},
    models::{CommentView, CreateComment},
    store::FilmStore,
};

pub const MAX_COMMENT_CHARS: usize = 500;

#[derive(Clone)]
pub struct CommentService {
    store: FilmStore,
    cache: ResponseCache,
}

impl CommentService {
    pub fn new(store: FilmStore, cache: ResponseCache) -> Self {
        Self { store, cache }
    }

    pub async fn list_comments(&self, film_id: i32) -> AppResult<Vec<CommentView>> {
        let film = self.store.film(film_id).await?.ok_or_else(|| AppError::film_not_found(film_id))?;
        let comments = self.store.comments_for(film.id).await?;
        comments.iter().map(|c| comment_view(c, &film)).collect()
    }

    /// Validates and stores a comment, then drops the cached film list so the
    /// next read picks up the new count.
    ///
    /// The per-film detail key is left alone and may show a stale count until
    /// it expires.
    pub async fn create_comment(&self, req: CreateComment) -> AppResult<CommentView> {
        let film_id = parse_film_id(req.film.as_ref())?;
        let film = self.store.film(film_id).await?.ok_or_else(|| AppError::film_not_found(film_id))?;
        let text = parse_comment_text(req.comment.as_ref())?;

        let created = self.store.insert_comment(film.id, &text, Timestamp::now().as_second()).await?;
        self.cache.delete(FILMS_LIST_KEY).await;
        info!(film_id = film.id, comment_id = created.id, "comment created");

        comment_view(&created, &film)
    }
}

fn parse_film_id(value: Option<&Value>) -> AppResult<i32> {
    let required = || AppError::Validation("film ID is required".to_string());
    let invalid = || AppError::Validation("film ID must be a valid integer".to_string());

    // only the falsy values `null`, `0` and `""` count as missing
    let id = match value {
        None | Some(Value::Null) => return Err(required()),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => return Err(required()),
            Some(id) => id,
            None => return Err(invalid()),
        },
        Some(Value::String(s)) if s.is_empty() => return Err(required()),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(_) => return Err(invalid()),
    };

    i32::try_from(id).map_err(|_| invalid())
}

fn parse_comment_text(value: Option<&Value>) -> AppResult<String> {
    let text = match value {
        None | Some(Value::Null) => {
            return Err(AppError::Validation("comment text is required".to_string()));
        },
        Some(Value::String(s)) if s.is_empty() => {
            return Err(AppError::Validation("comment text is required".to_string()));
        },
        Some(Value::String(s)) => s.trim(),
        Some(_) => return Err(AppError::Validation("comment must be a string".to_string())),
    };

    if text.is_empty() {
        return Err(AppError::Validation(
            "comment cannot be empty or whitespace only".to_string(),
        ));
    }

    let len = text.chars().count();
    if len > MAX_COMMENT_CHARS {
        return Err(AppError::Validation(format!(
            "Comment cannot exceed {MAX_COMMENT_CHARS} characters (current: {len})"
        )));
    }

    Ok(text.to_string())
}

fn comment_view(comment: &comment::Model, film: &film::Model) -> AppResult<CommentView> {
    Ok(CommentView {
        id: comment.id,
        comment: comment.text.clone(),
        created_at: Timestamp::from_second(comment.created_at)?,
        film_title: film.title.clone(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::{db, films::FilmQueries, models::{CatalogRecord, FilmView}};

    async fn setup() -> (FilmStore, ResponseCache, CommentService, i32) {
        let store = FilmStore::new(db::connect_and_migrate("sqlite::memory:", 1).await.unwrap());
        store
            .upsert_films(
                &[CatalogRecord {
                    external_id: "1".to_string(),
                    title: "A New Hope".to_string(),
                    release_date: "1977-05-25".parse().unwrap(),
                }],
                0,
            )
            .await
            .unwrap();
        let film_id = store.film_by_external_id("1").await.unwrap().unwrap().id;
        let cache = ResponseCache::in_memory(Duration::from_secs(600));
        let service = CommentService::new(store.clone(), cache.clone());
        (store, cache, service, film_id)
    }

    fn request(film: Value, comment: Value) -> CreateComment {
        CreateComment { film: Some(film), comment: Some(comment) }
    }

    fn validation_message(err: AppError) -> String {
        match err {
            AppError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn creates_trimmed_comment() {
        let (_, _, service, film_id) = setup().await;
        let created = service.create_comment(request(json!(film_id), json!("  Great!  "))).await.unwrap();
        assert_eq!(created.comment, "Great!");
        assert_eq!(created.film_title, "A New Hope");

        let listed = service.list_comments(film_id).await.unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn accepts_numeric_string_film_id() {
        let (_, _, service, film_id) = setup().await;
        let created =
            service.create_comment(request(json!(film_id.to_string()), json!("ok"))).await.unwrap();
        assert_eq!(created.comment, "ok");
    }

    #[tokio::test]
    async fn rejects_bad_input_in_order() {
        let (_, _, service, film_id) = setup().await;

        let missing_film = service
            .create_comment(CreateComment { film: None, comment: Some(json!("hi")) })
            .await
            .unwrap_err();
        assert_eq!(validation_message(missing_film), "film ID is required");

        let not_int = service.create_comment(request(json!("abc"), json!("hi"))).await.unwrap_err();
        assert_eq!(validation_message(not_int), "film ID must be a valid integer");

        let zero = service.create_comment(request(json!(0), json!("hi"))).await.unwrap_err();
        assert_eq!(validation_message(zero), "film ID is required");

        let blank_id = service.create_comment(request(json!("   "), json!("hi"))).await.unwrap_err();
        assert_eq!(validation_message(blank_id), "film ID must be a valid integer");

        // a zero written as a string is a real id that names no film
        let zero_string = service.create_comment(request(json!("0"), json!("hi"))).await.unwrap_err();
        assert!(matches!(zero_string, AppError::NotFound(_)));

        let fractional = service.create_comment(request(json!(1.5), json!("hi"))).await.unwrap_err();
        assert_eq!(validation_message(fractional), "film ID must be a valid integer");

        // unknown film wins over an empty comment
        let unknown = service.create_comment(request(json!(999), json!(""))).await.unwrap_err();
        assert!(matches!(unknown, AppError::NotFound(_)));

        let empty = service.create_comment(request(json!(film_id), json!(""))).await.unwrap_err();
        assert_eq!(validation_message(empty), "comment text is required");

        let blank = service.create_comment(request(json!(film_id), json!(" \n\t "))).await.unwrap_err();
        assert_eq!(validation_message(blank), "comment cannot be empty or whitespace only");

        let too_long =
            service.create_comment(request(json!(film_id), json!("x".repeat(501)))).await.unwrap_err();
        assert_eq!(
            validation_message(too_long),
            "Comment cannot exceed 500 characters (current: 501)"
        );
    }

    #[tokio::test]
    async fn length_limit_counts_characters_after_trim() {
        let (_, _, service, film_id) = setup().await;
        let padded = format!("  {}  ", "é".repeat(500));
        let created = service.create_comment(request(json!(film_id), json!(padded))).await.unwrap();
        assert_eq!(created.comment.chars().count(), 500);
    }

    #[tokio::test]
    async fn listing_unknown_film_is_not_found() {
        let (_, _, service, _) = setup().await;
        assert!(matches!(service.list_comments(404).await.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn creation_invalidates_list_but_not_detail() {
        let (store, cache, service, film_id) = setup().await;
        let queries = FilmQueries::new(store, cache.clone());

        let before: Vec<FilmView> = queries.list_films().await.unwrap().parse().unwrap();
        let detail_before: FilmView = queries.get_film("1").await.unwrap().parse().unwrap();
        assert_eq!(before[0].comment_count, 0);

        service.create_comment(request(json!(film_id), json!("Great!"))).await.unwrap();
        assert_eq!(cache.get(FILMS_LIST_KEY).await, None);

        let after: Vec<FilmView> = queries.list_films().await.unwrap().parse().unwrap();
        assert_eq!(after[0].comment_count, 1);

        // the detail key is not invalidated on comment creation
        let detail_after: FilmView = queries.get_film("1").await.unwrap().parse().unwrap();
        assert_eq!(detail_after, detail_before);
    }
}
