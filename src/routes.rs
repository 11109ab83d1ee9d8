//! HTTP surface: router, shared state and request handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::archive::FileArchive;
use crate::catalog::Directory;
use crate::error::ApiError;
use crate::store::CatalogSource;

/// Application state shared across handlers. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogSource>,
    pub archive: Arc<FileArchive>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/directory", get(directory))
        .route("/file_preview", get(file_preview))
        .route("/file_download", get(file_download))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Full catalog tree, rebuilt from the database on every call.
async fn directory(State(state): State<AppState>) -> Result<Json<Directory>, ApiError> {
    let rows = state.catalog.fetch_rows().await?;
    let directory = Directory::from_rows(rows);
    info!("Serving directory with {} customers", directory.customers.len());
    Ok(Json(directory))
}

#[derive(Deserialize)]
struct LocationQuery {
    location: Option<String>,
}

impl LocationQuery {
    fn require(self) -> Result<String, ApiError> {
        self.location.ok_or_else(ApiError::missing_location)
    }
}

#[derive(Serialize)]
struct PreviewResponse {
    content: String,
}

/// Return an archived file as UTF-8 text.
async fn file_preview(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let location = query.require()?;
    let archive = state.archive.clone();

    let content = tokio::task::spawn_blocking(move || archive.read_text(&location))
        .await
        .map_err(|e| ApiError::internal(format!("Preview task failed: {}", e)))?
        .map_err(ApiError::preview)?;

    Ok(Json(PreviewResponse { content }))
}

/// Return an archived file as a download attachment.
async fn file_download(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Response, ApiError> {
    let location = query.require()?;
    let archive = state.archive.clone();

    let file = tokio::task::spawn_blocking(move || archive.extract(&location))
        .await
        .map_err(|e| ApiError::internal(format!("Download task failed: {}", e)))?
        .map_err(ApiError::download)?;

    info!("Sending {} ({} bytes)", file.name, file.bytes.len());
    let disposition = format!("attachment; filename=\"{}\"", file.name.replace('"', "_"));
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::write_archive;
    use crate::catalog::CatalogRow;
    use crate::store::StoreError;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    enum FakeCatalog {
        Rows(Vec<CatalogRow>),
        ConnectFails,
        QueryFails,
    }

    #[async_trait]
    impl CatalogSource for FakeCatalog {
        async fn fetch_rows(&self) -> Result<Vec<CatalogRow>, StoreError> {
            match self {
                Self::Rows(rows) => Ok(rows.clone()),
                Self::ConnectFails => Err(StoreError::Connect(sqlx::Error::PoolTimedOut)),
                Self::QueryFails => Err(StoreError::Query(sqlx::Error::RowNotFound)),
            }
        }
    }

    fn test_app(catalog: FakeCatalog, dir: &TempDir) -> Router {
        let payload: &[u8] = &[0x00, 0x01, 0xfe, 0xff, b'\n', 0x7f];
        let archive_path = write_archive(
            dir,
            &[
                ("files/runs/t1/force.csv", &b"t,force\n0,0.0\n1,12.5\n"[..]),
                ("files/acme/widget/part.stl", payload),
                ("files/scans/raw.ply", &[0xffu8, 0xfe, 0xfd][..]),
            ],
        );
        router(AppState {
            catalog: Arc::new(catalog),
            archive: Arc::new(FileArchive::new(archive_path)),
        })
    }

    async fn send(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    fn sample_rows() -> Vec<CatalogRow> {
        let base = CatalogRow {
            customer_name: "Acme".to_string(),
            part_name: "Widget".to_string(),
            revision_name: "Rev1".to_string(),
            revision_uuid: Some("r1".to_string()),
            cad_file_uuid: Some("c1".to_string()),
            cad_file_type: Some("cad".to_string()),
            cad_file_location: Some("acme/widget/part.stl".to_string()),
            ..Default::default()
        };
        let forming = CatalogRow {
            trial_uuid: Some("t1".to_string()),
            process_run_type: Some("Forming".to_string()),
            file_uuid: Some("f1".to_string()),
            file_type: Some("csv".to_string()),
            file_location: Some("runs/t1/force.csv".to_string()),
            ..base
        };
        vec![forming.clone(), forming]
    }

    #[tokio::test]
    async fn test_health() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = send(test_app(FakeCatalog::Rows(vec![]), &dir), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn test_directory_nests_and_dedups() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(sample_rows()), &dir);

        let (status, _, body) = send(app, "/directory").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json_body(&body),
            json!({
                "Acme": {"Widget": {"Rev1": {
                    "CAD": [{
                        "uuid": "c1",
                        "type": "cad",
                        "location": "acme/widget/part.stl",
                        "name": "part.stl"
                    }],
                    "Trials": {"Forming": [{
                        "uuid": "f1",
                        "type": "csv",
                        "location": "runs/t1/force.csv",
                        "name": "force.csv"
                    }]}
                }}}
            })
        );
    }

    #[tokio::test]
    async fn test_directory_connect_failure() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = send(test_app(FakeCatalog::ConnectFails, &dir), "/directory").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(&body)
            .get("Error connecting to the database: ")
            .is_some());
    }

    #[tokio::test]
    async fn test_directory_query_failure() {
        let dir = TempDir::new().unwrap();
        let (status, _, body) = send(test_app(FakeCatalog::QueryFails, &dir), "/directory").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(&body).get("Error executing query: ").is_some());
    }

    #[tokio::test]
    async fn test_preview_returns_text() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(vec![]), &dir);

        let (status, _, body) = send(app, "/file_preview?location=runs%2Ft1%2Fforce.csv").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({"content": "t,force\n0,0.0\n1,12.5\n"}));
    }

    #[tokio::test]
    async fn test_preview_missing_entry() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(vec![]), &dir);

        let (status, _, body) = send(app, "/file_preview?location=foo/bar.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body), json!({"error": "File not found in zip archive"}));
    }

    #[tokio::test]
    async fn test_preview_binary_is_server_error() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(vec![]), &dir);

        let (status, _, body) = send(app, "/file_preview?location=scans/raw.ply").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(&body)["error"].is_string());
    }

    #[tokio::test]
    async fn test_preview_without_location() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(vec![]), &dir);

        let (status, _, body) = send(app, "/file_preview").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body), json!({"error": "Missing location parameter"}));
    }

    #[tokio::test]
    async fn test_download_is_byte_identical_attachment() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(vec![]), &dir);

        let (status, headers, body) =
            send(app, "/file_download?location=acme/widget/part.stl").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, vec![0x00u8, 0x01, 0xfe, 0xff, b'\n', 0x7f]);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"part.stl\""
        );
        assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    }

    #[tokio::test]
    async fn test_download_missing_entry() {
        let dir = TempDir::new().unwrap();
        let app = test_app(FakeCatalog::Rows(vec![]), &dir);

        let (status, _, body) = send(app, "/file_download?location=foo/bar.txt").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json_body(&body), json!({"error": "File does not exist in zip archive"}));
    }

    #[tokio::test]
    async fn test_download_with_missing_archive() {
        let dir = TempDir::new().unwrap();
        let app = router(AppState {
            catalog: Arc::new(FakeCatalog::Rows(vec![])),
            archive: Arc::new(FileArchive::new(dir.path().join("missing.zip"))),
        });

        let (status, _, body) = send(app, "/file_download?location=a.txt").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(&body)["error"].is_string());
    }
}
