//! HTTP API Server
//!
//! REST surface of a storage node: file upload/download/listing, health
//! probe target, stats, and leader queries. Uploads are admitted only on
//! the node currently designated leader and fan out to peers through the
//! replication dispatcher after the local write succeeds.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cluster::{ElectionService, HeartbeatMonitor, LeaderElection};
use crate::error::{Error, Result};
use crate::replication::ReplicationDispatcher;
use crate::storage::LocalStore;

/// Shared application state
pub struct AppState {
    /// Node ID
    pub node_id: String,
    /// Leader rotation service
    pub election: Arc<ElectionService>,
    /// Peer liveness monitor
    pub heartbeat: Arc<HeartbeatMonitor>,
    /// Replication fan-out
    pub replication: Arc<ReplicationDispatcher>,
    /// Local file store
    pub store: Arc<LocalStore>,
    /// Process start time, for uptime reporting
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// HTTP API server
pub struct HttpServer {
    bind_address: String,
    cors_enabled: bool,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(bind_address: String, cors_enabled: bool, state: Arc<AppState>) -> Self {
        Self {
            bind_address,
            cors_enabled,
            state,
        }
    }

    /// Create the router
    pub fn create_router(state: Arc<AppState>, cors_enabled: bool) -> Router {
        let router = Router::new()
            .route("/upload", post(handle_upload))
            .route("/download", get(handle_download))
            .route("/files", get(handle_files))
            .route("/delete", delete(handle_delete))
            .route("/health", get(handle_health))
            .route("/stats", get(handle_stats))
            .route("/leader", get(handle_leader))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        let app = Self::create_router(Arc::clone(&self.state), self.cors_enabled);

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Request/Response Types ============

/// Query parameter carrying a filename
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub name: Option<String>,
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub node_id: String,
    pub is_leader: bool,
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub node_id: String,
    pub is_leader: bool,
    pub leader_id: Option<String>,
    pub total_files: usize,
    pub total_bytes: u64,
    pub quota_bytes: u64,
    pub uptime_seconds: i64,
    pub peers: HashMap<String, bool>,
}

/// Leader response
#[derive(Debug, Serialize)]
pub struct LeaderResponse {
    pub leader: Option<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(status: StatusCode, code: &str, error: String) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error,
            code: code.to_string(),
        }),
    )
        .into_response()
}

// ============ Handlers ============

/// Accept one uploaded file, persist it, and trigger replication.
/// Only the current leader admits uploads.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if !state.election.is_leader(&state.node_id) {
        let err = match state.election.current_leader() {
            Some(leader) => Error::NotLeader(leader),
            None => Error::NoLeader,
        };
        return error_response(StatusCode::FORBIDDEN, "NOT_LEADER", err.to_string());
    }

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "BAD_MULTIPART",
                    format!("Failed to read multipart body: {}", e),
                );
            }
        };

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "BAD_MULTIPART",
                    format!("Failed to read file content: {}", e),
                );
            }
        };

        return match state.store.save(&filename, &bytes).await {
            Ok(path) => {
                state.replication.trigger(&filename, &path);
                tracing::info!("File uploaded: {}", filename);
                (
                    StatusCode::OK,
                    Json(UploadResponse {
                        success: true,
                        filename,
                    }),
                )
                    .into_response()
            }
            Err(e @ Error::QuotaExceeded { .. }) => {
                error_response(StatusCode::INSUFFICIENT_STORAGE, "QUOTA_EXCEEDED", e.to_string())
            }
            Err(e @ Error::InvalidFilename(_)) => {
                error_response(StatusCode::BAD_REQUEST, "INVALID_FILENAME", e.to_string())
            }
            Err(e) => {
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
        };
    }

    error_response(
        StatusCode::BAD_REQUEST,
        "MISSING_FILE",
        "No file field in upload".to_string(),
    )
}

async fn handle_download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> impl IntoResponse {
    let Some(name) = query.name else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "MISSING_NAME",
            "Missing filename".to_string(),
        );
    };

    match state.store.read(&name).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e @ Error::FileNotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "FILE_NOT_FOUND", e.to_string())
        }
        Err(e @ Error::InvalidFilename(_)) => {
            error_response(StatusCode::BAD_REQUEST, "INVALID_FILENAME", e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
    }
}

async fn handle_files(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(names) => Json(names).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
    }
}

/// Remove a file. Deleting a name that was never stored still answers 200.
async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FileQuery>,
) -> impl IntoResponse {
    let Some(name) = query.name else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "MISSING_NAME",
            "Missing filename".to_string(),
        );
    };

    match state.store.delete(&name).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e @ Error::InvalidFilename(_)) => {
            error_response(StatusCode::BAD_REQUEST, "INVALID_FILENAME", e.to_string())
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
    }
}

/// Liveness target for peers' heartbeat probes. Must answer plain 200.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        node_id: state.node_id.clone(),
        is_leader: state.election.is_leader(&state.node_id),
    })
}

async fn handle_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let total_files = state.store.file_count().await.unwrap_or(0);
    let total_bytes = state.store.usage().await.unwrap_or(0);

    Json(StatsResponse {
        node_id: state.node_id.clone(),
        is_leader: state.election.is_leader(&state.node_id),
        leader_id: state.election.current_leader(),
        total_files,
        total_bytes,
        quota_bytes: state.store.quota_bytes(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
        peers: state.heartbeat.statuses(),
    })
}

async fn handle_leader(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(LeaderResponse {
        leader: state.election.current_leader(),
    })
}
