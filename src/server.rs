use crate::config::AppConfig;
use crate::db::Database;
use crate::error::{IngestError, Result};
use crate::pipeline::importer::import_file;
use crate::pipeline::writer::TripWriter;
use crate::types::ImportSummary;
use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use hyper::Server;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared service state: the database handle and the startup config.
/// Each import request acquires its own connection from here.
pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
}

/// 200 body for a finished import: a status message with the summary
/// counts flattened alongside it.
#[derive(Serialize)]
struct ImportResponse {
    message: &'static str,
    #[serde(flatten)]
    summary: ImportSummary,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "bikeshare-ingest",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Receive a trip-history CSV as multipart form data, spool it to the
/// uploads directory, then stream it through the import pipeline.
async fn import_csv(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let spooled = match spool_upload(&state.config.uploads_dir, multipart).await {
        Ok(Some(path)) => path,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "No file uploaded" })),
            )
                .into_response();
        }
        Err(err) => {
            error!("failed to receive upload: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Error processing CSV data" })),
            )
                .into_response();
        }
    };

    match run_pipeline(&state, &spooled).await {
        Ok(summary) => Json(ImportResponse {
            message: "CSV data imported successfully",
            summary,
        })
        .into_response(),
        Err(err) => {
            error!("import of {} failed: {err}", spooled.display());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Error processing CSV data" })),
            )
                .into_response()
        }
    }
}

async fn run_pipeline(state: &AppState, path: &Path) -> Result<ImportSummary> {
    let conn = state.db.acquire().await?;
    let writer = TripWriter::new(conn);
    import_file(path, &writer, state.config.batch_size).await
}

/// Write the uploaded `file` field to the uploads directory under a
/// timestamped name. `Ok(None)` means the request carried no file.
async fn spool_upload(uploads_dir: &Path, mut multipart: Multipart) -> Result<Option<PathBuf>> {
    tokio::fs::create_dir_all(uploads_dir).await?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::Upload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = match field.file_name() {
            Some(name) if !name.is_empty() => sanitize_file_name(name),
            _ => continue,
        };

        let spool_name = format!("{original_name}-{}", Utc::now().timestamp_millis());
        let path = uploads_dir.join(spool_name);

        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| IngestError::Upload(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("spooled upload to {}", path.display());
        return Ok(Some(path));
    }

    Ok(None)
}

/// Strip any path components from the client-supplied filename.
fn sanitize_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.csv".to_string())
}

/// Create the HTTP server with all routes
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/import-csv", post(import_csv))
        .layer(Extension(state))
        // Trip-history exports run to hundreds of megabytes
        .layer(DefaultBodyLimit::disable())
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server and serve until SIGINT or SIGTERM.
pub async fn start_server(state: Arc<AppState>, port: u16) -> Result<()> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚲 Import service running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📥 CSV upload:   POST http://localhost:{port}/import-csv");

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_file_name("trips.csv"), "trips.csv");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("dir/trips.csv"), "trips.csv");
    }

    #[test]
    fn import_response_keeps_summary_fields_top_level() {
        let body = serde_json::to_value(ImportResponse {
            message: "CSV data imported successfully",
            summary: ImportSummary {
                rows_read: 5,
                batches_written: 3,
                coordinates_inserted: 10,
                stations_inserted: 4,
                rides_inserted: 5,
            },
        })
        .unwrap();

        assert_eq!(body["message"], "CSV data imported successfully");
        assert_eq!(body["rows_read"], 5);
        assert_eq!(body["rides_inserted"], 5);
    }
}
