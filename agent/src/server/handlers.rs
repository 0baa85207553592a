//! HTTP request handlers

use std::process::Stdio;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio_util::io::ReaderStream;

use crate::kube::driver;
use crate::server::state::ServerState;
use crate::utils::{validate_name, version_info};

const DEFAULT_LOG_LINES: usize = 100;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub registered: bool,
    pub agent_id: Option<String>,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let identity = state.app.identity();
    let registered = identity.is_some();

    Json(HealthResponse {
        status: if registered { "ok" } else { "degraded" }.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        registered,
        agent_id: identity.map(|identity| identity.id),
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Log query parameters
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<usize>,
}

/// Captured log query handler (thin framing over `kubectl logs`)
pub async fn logs_handler(
    State(_state): State<Arc<ServerState>>,
    Path((namespace, app)): Path<(String, String)>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    let result = driver::pod_logs(&namespace, &app, lines).await;

    if result.success {
        Ok(result.stdout)
    } else if result.error.as_deref().is_some_and(|e| e.contains("invalid")) {
        Err(StatusCode::BAD_REQUEST)
    } else {
        Err(StatusCode::BAD_GATEWAY)
    }
}

/// Streamed log handler, backed by `kubectl logs -f`
pub async fn logs_stream_handler(
    State(_state): State<Arc<ServerState>>,
    Path((namespace, app)): Path<(String, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    if validate_name("namespace", &namespace).is_err() || validate_name("app", &app).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let deployment = format!("deployment/{}", app);
    let mut child = Command::new("kubectl")
        .args(["logs", "-f", &deployment, "-n", &namespace, "--tail=100"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|_| StatusCode::BAD_GATEWAY)?;

    let stdout = child.stdout.take().ok_or(StatusCode::BAD_GATEWAY)?;

    // Keep the child alive for the duration of the stream; it dies with
    // the pipe once the client disconnects.
    tokio::spawn(async move {
        let _ = child.wait().await;
    });

    Ok(Body::from_stream(ReaderStream::new(stdout)))
}
