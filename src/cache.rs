//! Response cache: a key/value store of pre-serialized JSON payloads with a
//! per-key TTL.
//!
//! Services talk to [`ResponseCache`], which never fails. Backend errors are
//! logged and read as misses, so a broken cache only costs a recomputation.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use tracing::{debug, info, warn};

use crate::entities::response_cache;

/// Key of the assembled film list.
pub const FILMS_LIST_KEY: &str = "films_list";

/// Key of a single film's detail payload.
pub fn film_key(external_id: &str) -> String {
    format!("film_{external_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] sea_orm::DbErr),
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Clone, Debug)]
struct MemoryEntry {
    payload: String,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-process backend. Expired entries are dropped when read.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` only if it is still expired, so an entry a concurrent
    /// `set` just wrote survives.
    fn evict_if_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, e| e.is_expired(Instant::now()));
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(Instant::now()) {
                return Ok(Some(entry.payload.clone()));
            }
        }
        self.evict_if_expired(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry { payload: value, expires_at: Instant::now().checked_add(ttl) },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Backend stored in the `response_cache` table.
#[derive(Clone)]
pub struct DbCache {
    db: DatabaseConnection,
}

impl DbCache {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Removes every expired row. Returns how many were dropped.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let res = response_cache::Entity::delete_many()
            .filter(response_cache::Column::ExpiresAt.lte(now_sec()))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }
}

#[async_trait]
impl CacheBackend for DbCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = response_cache::Entity::find_by_id(key.to_string()).one(&self.db).await?;
        Ok(row.filter(|r| is_fresh(r.expires_at)).map(|r| r.payload))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let model = response_cache::ActiveModel {
            key: Set(key.to_string()),
            payload: Set(value),
            expires_at: Set(now_sec().saturating_add(ttl_secs)),
        };

        response_cache::Entity::insert(model)
            .on_conflict(
                OnConflict::column(response_cache::Column::Key)
                    .update_columns([
                        response_cache::Column::Payload,
                        response_cache::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        response_cache::Entity::delete_by_id(key.to_string()).exec(&self.db).await?;
        Ok(())
    }
}

fn is_fresh(expires_at: i64) -> bool {
    now_sec() < expires_at
}

fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}

/// The cache handle injected into services. Every key shares one TTL.
#[derive(Clone)]
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), ttl)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(Some(payload)) => {
                debug!(key = %key, "cache hit");
                Some(payload)
            },
            Ok(None) => {
                info!(key = %key, "cache miss");
                None
            },
            Err(err) => {
                warn!(key = %key, error = %err, "cache read failed, treating as miss");
                None
            },
        }
    }

    pub async fn set(&self, key: &str, payload: String) {
        if let Err(err) = self.backend.set(key, payload, self.ttl).await {
            warn!(key = %key, error = %err, "cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        match self.backend.delete(key).await {
            Ok(()) => debug!(key = %key, "cache key invalidated"),
            Err(err) => warn!(key = %key, error = %err, "cache invalidation failed"),
        }
    }
}
