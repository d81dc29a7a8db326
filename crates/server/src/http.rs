//! HTTP surface: history as JSON, stored-file downloads, and the static
//! client page.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::debug;

use lanchat_protocol::types::ChatMessage;
use lanchat_store::{FileStore, HistoryStore};

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub history: Arc<HistoryStore>,
    pub files: Arc<FileStore>,
}

/// Builds the HTTP router. `static_dir`, when given, serves the client page.
pub fn build_router(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/api/history", get(get_history))
        .route("/files/{name}", get(download_file));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ChatMessage>,
    current_ip: String,
}

async fn get_history(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.history.global(),
        current_ip: addr.ip().to_string(),
    })
}

async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, StatusCode> {
    let bytes = match state.files.read(&name).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(lanchat_store::StoreError::InvalidName(n)) => {
            debug!(name = %n, "rejected download name");
            return Err(StatusCode::NOT_FOUND);
        }
        Err(e) => {
            tracing::error!(name = %name, "file download failed: {e}");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    // The original filename and MIME type are recorded in the history entry
    // that references this stored name.
    let meta = state.history.find_file_meta(&name);
    let download_name = meta
        .as_ref()
        .map(|m| m.name.replace(['"', '\r', '\n'], "_"))
        .unwrap_or_else(|| name.clone());
    let content_type = meta
        .map(|m| m.mime_type)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    debug!(stored = %name, download = %download_name, "serving file");

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{download_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
