//! One-shot catalog sync: pull the remote film list, upsert it by external
//! id and invalidate the cached list.

use anyhow::Context;
use async_trait::async_trait;
use jiff::{Timestamp, civil::Date, tz::TimeZone};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    cache::{FILMS_LIST_KEY, ResponseCache},
    error::AppResult,
    models::{CatalogRecord, RemoteFilm, SyncReport, SyncedFilm},
    store::FilmStore,
};

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Where the films come from, for log lines.
    fn name(&self) -> &str;

    async fn fetch_films(&self) -> anyhow::Result<Vec<RemoteFilm>>;
}

/// Reads the SWAPI-style film list: a JSON array of objects carrying at
/// least `title` and `release_date`.
pub struct SwapiClient {
    client: reqwest::Client,
    url: String,
}

impl SwapiClient {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl CatalogSource for SwapiClient {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch_films(&self) -> anyhow::Result<Vec<RemoteFilm>> {
        let films: Vec<SwapiFilm> = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()?
            .json()
            .await
            .context("catalog response is not a film list")?;

        let today = today_utc();
        Ok(films.into_iter().map(|f| f.into_remote(today)).collect())
    }
}

#[derive(Debug, Deserialize)]
struct SwapiFilm {
    title: Option<String>,
    release_date: Option<String>,
}

impl SwapiFilm {
    fn into_remote(self, fallback_date: Date) -> RemoteFilm {
        let release_date = self
            .release_date
            .as_deref()
            .and_then(|s| s.trim().parse::<Date>().ok())
            .unwrap_or(fallback_date);
        RemoteFilm { title: self.title.unwrap_or_default(), release_date }
    }
}

fn today_utc() -> Date {
    Timestamp::now().to_zoned(TimeZone::UTC).date()
}

/// External ids are positions in fetch order: `"1"`, `"2"`, ...
pub fn assign_external_ids(films: Vec<RemoteFilm>) -> Vec<CatalogRecord> {
    films
        .into_iter()
        .enumerate()
        .map(|(i, f)| CatalogRecord {
            external_id: (i + 1).to_string(),
            title: f.title,
            release_date: f.release_date,
        })
        .collect()
}

pub async fn sync_catalog(
    store: &FilmStore,
    cache: &ResponseCache,
    source: &dyn CatalogSource,
) -> AppResult<SyncReport> {
    info!(source = %source.name(), "starting film sync");

    let films = source
        .fetch_films()
        .await
        .with_context(|| format!("failed to fetch films from {}", source.name()))?;
    debug!(count = films.len(), "fetched remote films");

    let records = assign_external_ids(films);
    let created = store.upsert_films(&records, Timestamp::now().as_second()).await?;

    let mut report = SyncReport { total: records.len(), ..Default::default() };
    for (record, created) in records.into_iter().zip(created) {
        if created {
            report.created += 1;
        } else {
            report.updated += 1;
        }
        report.films.push(SyncedFilm {
            external_id: record.external_id,
            title: record.title,
            created,
        });
    }

    cache.delete(FILMS_LIST_KEY).await;
    info!(
        total = report.total,
        created = report.created,
        updated = report.updated,
        "film sync complete"
    );

    Ok(report)
}
