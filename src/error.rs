//! HTTP error responses.
//!
//! Every handler failure becomes an [`ApiError`]: a status code plus the JSON
//! body clients already expect. Errors are logged here, once, on conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::archive::ArchiveError;
use crate::store::StoreError;

pub const PREVIEW_NOT_FOUND: &str = "File not found in zip archive";
pub const DOWNLOAD_NOT_FOUND: &str = "File does not exist in zip archive";
pub const MISSING_LOCATION: &str = "Missing location parameter";

#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiError {
    fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("Request failed: {}", message);
        Self::error(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn missing_location() -> Self {
        warn!("Request without location parameter");
        Self::error(StatusCode::BAD_REQUEST, MISSING_LOCATION)
    }

    /// Map an archive failure from the preview route.
    pub fn preview(err: ArchiveError) -> Self {
        Self::from_archive(err, PREVIEW_NOT_FOUND)
    }

    /// Map an archive failure from the download route.
    pub fn download(err: ArchiveError) -> Self {
        Self::from_archive(err, DOWNLOAD_NOT_FOUND)
    }

    fn from_archive(err: ArchiveError, not_found: &str) -> Self {
        match err {
            ArchiveError::EntryNotFound(entry) => {
                warn!("Archive entry not found: {}", entry);
                Self::error(StatusCode::NOT_FOUND, not_found)
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Body keys carry the failure stage, e.g. {"Error executing query: ": "..."}.
        let key = match &err {
            StoreError::Connect(_) => "Error connecting to the database: ",
            StoreError::Query(_) => "Error executing query: ",
        };
        error!("{}{}", key, err);

        let mut body = serde_json::Map::new();
        body.insert(key.to_string(), Value::String(err.to_string()));
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: Value::Object(body),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
