use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilmView {
    pub id: i32,
    pub title: String,
    pub release_date: Date,
    pub comment_count: u64,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CommentView {
    pub id: i32,
    pub comment: String,
    pub created_at: Timestamp,
    pub film_title: String,
}

/// Body of `POST /comments/`. Fields stay untyped so that each can be
/// validated in order with its own message.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateComment {
    #[serde(default)]
    pub film: Option<serde_json::Value>,
    #[serde(default)]
    pub comment: Option<serde_json::Value>,
}

/// A film as delivered by the remote catalog, in fetch order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteFilm {
    pub title: String,
    pub release_date: Date,
}

/// A remote film paired with the external id sync assigned to it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CatalogRecord {
    pub external_id: String,
    pub title: String,
    pub release_date: Date,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub films: Vec<SyncedFilm>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SyncedFilm {
    pub external_id: String,
    pub title: String,
    pub created: bool,
}

/// A JSON payload as it sits in the response cache, served without
/// re-encoding.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CachedJson(pub String);

impl CachedJson {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.0)
    }
}

impl IntoResponse for CachedJson {
    fn into_response(self) -> Response {
        ([(header::CONTENT_TYPE, "application/json")], self.0).into_response()
    }
}
