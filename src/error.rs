use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Body detail used for server errors unless detail exposure is enabled.
pub const GENERIC_DETAIL: &str = "Internal server error";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn film_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("Film with ID \"{id}\" does not exist"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation error",
            Self::NotFound(_) => "Film not found",
            Self::Store(_) | Self::Internal(_) => "Internal server error",
        }
    }
}

impl From<jiff::Error> for AppError {
    fn from(err: jiff::Error) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
}

/// The unredacted message of a server error. Attached to the response so the
/// router can reveal it when `EXPOSE_ERROR_DETAILS` is set.
#[derive(Clone, Debug)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        let message = format!("{self:#}");

        if !status.is_server_error() {
            return (status, Json(ErrorBody { error: kind, detail: message })).into_response();
        }

        tracing::error!(error = %message, "request failed");
        let mut resp =
            (status, Json(ErrorBody { error: kind, detail: GENERIC_DETAIL.to_string() }))
                .into_response();
        resp.extensions_mut().insert(ErrorDetail { kind, message });
        resp
    }
}

pub type AppResult<T> = Result<T, AppError>;
