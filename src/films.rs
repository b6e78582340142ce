//! Film list and detail responses, served read-through from the response
//! cache.
//!
//! Population is check, compute, store with no lock around it. The computed
//! payload depends only on what the store holds, so two requests racing on a
//! cold key write the same bytes.

use tracing::{debug, info, warn};

use crate::{
    cache::{FILMS_LIST_KEY, ResponseCache, film_key},
    entities::film,
    error::{AppError, AppResult},
    models::{CachedJson, FilmView},
    store::FilmStore,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WarmOutcome {
    AlreadyCached,
    Populated(usize),
    NoFilms,
}

#[derive(Clone)]
pub struct FilmQueries {
    store: FilmStore,
    cache: ResponseCache,
}

impl FilmQueries {
    pub fn new(store: FilmStore, cache: ResponseCache) -> Self {
        Self { store, cache }
    }

    pub async fn list_films(&self) -> AppResult<CachedJson> {
        if let Some(payload) = self.cache.get(FILMS_LIST_KEY).await {
            return Ok(CachedJson(payload));
        }

        let films = self.assemble_list().await?;
        let payload = serde_json::to_string(&films)?;
        self.cache.set(FILMS_LIST_KEY, payload.clone()).await;
        debug!(count = films.len(), "cached film list");

        Ok(CachedJson(payload))
    }

    pub async fn get_film(&self, external_id: &str) -> AppResult<CachedJson> {
        let key = film_key(external_id);
        if let Some(payload) = self.cache.get(&key).await {
            return Ok(CachedJson(payload));
        }

        let film = self
            .store
            .film_by_external_id(external_id)
            .await?
            .ok_or_else(|| AppError::film_not_found(external_id))?;

        let count = self.comment_count(film.id).await;
        let payload = serde_json::to_string(&film_view(&film, count)?)?;
        self.cache.set(&key, payload.clone()).await;

        Ok(CachedJson(payload))
    }

    /// Fills the list key once at startup if nothing is cached yet.
    pub async fn warm(&self) -> AppResult<WarmOutcome> {
        if self.cache.get(FILMS_LIST_KEY).await.is_some() {
            return Ok(WarmOutcome::AlreadyCached);
        }
        if !self.store.has_films().await? {
            return Ok(WarmOutcome::NoFilms);
        }

        let films = self.assemble_list().await?;
        self.cache.set(FILMS_LIST_KEY, serde_json::to_string(&films)?).await;
        info!(count = films.len(), "warmed film list cache");

        Ok(WarmOutcome::Populated(films.len()))
    }

    async fn assemble_list(&self) -> AppResult<Vec<FilmView>> {
        let rows = self.store.films_by_release_date().await?;
        let mut films = Vec::with_capacity(rows.len());
        for row in &rows {
            let count = self.comment_count(row.id).await;
            films.push(film_view(row, count)?);
        }
        Ok(films)
    }

    /// Number of comments on a film. Zero if counting fails for any reason.
    pub async fn comment_count(&self, film_id: i32) -> u64 {
        match self.store.comment_count(film_id).await {
            Ok(count) => count,
            Err(err) => {
                warn!(film_id, error = %err, "failed to count comments, defaulting to 0");
                0
            },
        }
    }
}

fn film_view(film: &film::Model, comment_count: u64) -> AppResult<FilmView> {
    Ok(FilmView {
        id: film.id,
        title: film.title.clone(),
        release_date: film.release_date.parse()?,
        comment_count,
    })
}
