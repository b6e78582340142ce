use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;

pub const DEFAULT_CATALOG_URL: &str = "https://swapi.info/api/films/";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheBackendKind {
    Memory,
    /// Shared through the `response_cache` table, so a `sync` run in another
    /// process invalidates what the server cached.
    Database,
}

impl FromStr for CacheBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "database" | "db" => Ok(Self::Database),
            other => anyhow::bail!("unknown cache backend {other:?} (expected memory or database)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub cache_backend: CacheBackendKind,
    pub cache_ttl: Duration,
    pub catalog_url: String,
    pub http_timeout: Duration,
    pub warm_cache: bool,
    pub expose_error_details: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            database_url: "sqlite://filmnotes.db?mode=rwc".to_string(),
            database_max_connections: 5,
            cache_backend: CacheBackendKind::Memory,
            cache_ttl: Duration::from_secs(600),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            http_timeout: Duration::from_secs(30),
            warm_cache: true,
            expose_error_details: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults.database_url.clone());

        let database_max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.database_max_connections);

        let cache_backend = match std::env::var("CACHE_BACKEND") {
            Ok(s) => s.parse().context("CACHE_BACKEND")?,
            Err(_) => defaults.cache_backend,
        };

        let cache_ttl_secs: u64 = std::env::var("CACHE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.cache_ttl.as_secs());

        let catalog_url =
            std::env::var("CATALOG_URL").unwrap_or_else(|_| defaults.catalog_url.clone());

        let http_timeout_secs: u64 = std::env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.http_timeout.as_secs());

        let warm_cache = env_flag("WARM_CACHE").unwrap_or(defaults.warm_cache);
        let expose_error_details =
            env_flag("EXPOSE_ERROR_DETAILS").unwrap_or(defaults.expose_error_details);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            database_max_connections,
            cache_backend,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            catalog_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
            warm_cache,
            expose_error_details,
        })
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|s| parse_flag(&s))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
