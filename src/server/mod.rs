//! HTTP JSON API over one [`QaSession`].
//!
//! Routes:
//! - `POST /api/ingest[?force=true]` raw PDF body, persisted then ingested
//! - `POST /api/query` `{"question": "..."}`
//! - `GET /api/status`
//! - `GET /health`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::config::Settings;
use crate::error::{ErrorCode, QaError};
use crate::qa::{IngestReport, QaSession, QueryResult, SessionStatus};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    session: Arc<QaSession>,
    /// Fixed location uploads are written to, overwritten each time.
    upload_path: PathBuf,
    /// Held from writing the upload until its ingest returns.
    upload_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(session: Arc<QaSession>, upload_path: impl Into<PathBuf>) -> Self {
        Self {
            session,
            upload_path: upload_path.into(),
            upload_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngestParams {
    #[serde(default)]
    pub force: bool,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// A [`QaError`] rendered as a JSON response.
pub struct ApiError(QaError);

impl From<QaError> for ApiError {
    fn from(e: QaError) -> Self {
        Self(e)
    }
}

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotReady | ErrorCode::Busy => StatusCode::CONFLICT,
        ErrorCode::InvalidQuery => StatusCode::BAD_REQUEST,
        ErrorCode::IoError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::RemoteServiceError => StatusCode::BAD_GATEWAY,
        ErrorCode::StorageError | ErrorCode::ConfigError | ErrorCode::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = status_for(code);
        if status.is_server_error() {
            tracing::error!(target: "server", "{code}: {}", self.0);
        } else {
            tracing::debug!(target: "server", "{code}: {}", self.0);
        }

        let body = ErrorBody {
            code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the API router.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/ingest", post(ingest_handler))
        .route("/api/query", post(query_handler))
        .route("/api/status", get(status_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn status_handler(State(state): State<AppState>) -> Json<SessionStatus> {
    Json(state.session.status().await)
}

async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let result = state.session.query(&request.question).await?;
    Ok(Json(result))
}

async fn ingest_handler(
    State(state): State<AppState>,
    Query(params): Query<IngestParams>,
    body: Bytes,
) -> Result<Json<IngestReport>, ApiError> {
    let _upload = state
        .upload_lock
        .try_lock()
        .map_err(|_| QaError::IngestInProgress)?;

    persist_upload(&state.upload_path, &body).await?;
    crate::log_event!("server", "uploaded", "{} bytes", body.len());

    let report = state
        .session
        .ingest(&state.upload_path, params.force)
        .await?;
    Ok(Json(report))
}

/// Write the upload next to its destination, then rename over it.
async fn persist_upload(path: &Path, bytes: &[u8]) -> Result<(), QaError> {
    let io_error = |path: &Path, source| QaError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let partial = path.with_extension("part");
    tokio::fs::write(&partial, bytes)
        .await
        .map_err(|e| io_error(&partial, e))?;
    tokio::fs::rename(&partial, path)
        .await
        .map_err(|e| io_error(path, e))
}

/// Run the API until Ctrl+C.
pub async fn serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let session = Arc::new(QaSession::from_settings(settings)?);
    let state = AppState::new(session, settings.upload_file());
    let app = router(state, settings.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    crate::log_event!("server", "listening", "http://{bind}");
    eprintln!("docqa API listening on http://{bind}");
    eprintln!("Press Ctrl+C to stop the server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    eprintln!("HTTP server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "server", "cannot listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    eprintln!("Received shutdown signal");
}
