//! Scan workflow endpoints
//!
//! Endpoints:
//! - POST /scan/start - Validate folder, create session, spawn the orchestrator
//! - GET /scan/status/:session_id - Session state, progress, and final report
//! - POST /scan/cancel/:session_id - Request cancellation of a running scan
//! - GET /scan/report - Report of the most recent finished scan

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{MatchPolicy, ScanReport, ScanSession, ScanState};
use crate::services::{FsImageStore, ScanOrchestrator};
use crate::AppState;

/// Request body for POST /scan/start
///
/// Both fields are optional: the folder defaults to the store root, and any
/// omitted policy field takes its default value.
#[derive(Debug, Default, Deserialize)]
pub struct StartScanRequest {
    /// Folder to scan, relative to the image store root
    #[serde(default)]
    pub folder: Option<String>,
    /// Policy overrides for this run
    #[serde(default)]
    pub policy: Option<MatchPolicy>,
}

/// Response for POST /scan/start
#[derive(Debug, Serialize)]
pub struct StartScanResponse {
    pub session_id: Uuid,
    pub state: ScanState,
}

/// Response for GET /scan/report
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub session_id: Uuid,
    pub report: ScanReport,
}

/// POST /scan/start
///
/// Starts a reconciliation scan as a background task and returns
/// immediately. At most one scan runs at a time; a second start request
/// while one is running is rejected with 409.
pub async fn start_scan(
    State(state): State<AppState>,
    body: Option<Json<StartScanRequest>>,
) -> ApiResult<(StatusCode, Json<StartScanResponse>)> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let folder = request.folder.unwrap_or_default();
    let policy = request.policy.unwrap_or_default();

    // Relative folder only; no escaping the image store root
    if folder.split('/').any(|part| part == "..") || folder.starts_with('/') {
        return Err(ApiError::BadRequest(format!("Invalid folder: {}", folder)));
    }
    let target = if folder.is_empty() {
        state.images_root.clone()
    } else {
        state.images_root.join(&folder)
    };
    if !target.is_dir() {
        return Err(ApiError::NotFound(format!("Folder not found: {}", folder)));
    }

    if policy.candidate_threshold > policy.direct_link_threshold {
        return Err(ApiError::BadRequest(
            "candidate_threshold must not exceed direct_link_threshold".to_string(),
        ));
    }

    if db::sessions::has_running_session(&state.db).await? {
        warn!("Scan start rejected, another scan is already running");
        return Err(ApiError::Conflict("A scan is already running".to_string()));
    }

    let session = ScanSession::new(folder, policy);
    let session_id = session.session_id;
    db::sessions::save_session(&state.db, &session).await?;

    let cancel = CancellationToken::new();
    state
        .cancellation_tokens
        .write()
        .await
        .insert(session_id, cancel.clone());

    info!(session_id = %session_id, folder = %session.root_folder, "Scan session created");

    let task_state = state.clone();
    tokio::spawn(async move {
        let store = Arc::new(FsImageStore::new(task_state.images_root.clone()));
        let orchestrator = ScanOrchestrator::new(
            task_state.db.clone(),
            store,
            task_state.event_bus.clone(),
            cancel,
        );
        let finished = orchestrator.run(session).await;

        if finished.state == ScanState::Failed {
            let message = finished.progress.current_operation.clone();
            error!(session_id = %session_id, "Scan session failed: {}", message);
            *task_state.last_error.write().await = Some(message);
        }

        task_state.cancellation_tokens.write().await.remove(&session_id);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartScanResponse {
            session_id,
            state: ScanState::Initializing,
        }),
    ))
}

/// GET /scan/status/:session_id
///
/// Full session snapshot: state, progress, and the final report once the
/// session reaches a terminal state.
pub async fn scan_status(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ScanSession>> {
    let session = db::sessions::load_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Session not found: {}", session_id)))?;
    Ok(Json(session))
}

/// POST /scan/cancel/:session_id
///
/// Signals cancellation to the running orchestrator. The session reaches
/// CANCELLED at its next batch boundary; partial results created so far are
/// kept.
pub async fn cancel_scan(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let token = state.cancellation_tokens.read().await.get(&session_id).cloned();

    if let Some(token) = token {
        info!(session_id = %session_id, "Cancellation requested");
        token.cancel();
        return Ok(StatusCode::ACCEPTED);
    }

    // No live token; distinguish a finished session from an unknown one
    match db::sessions::load_session(&state.db, session_id).await? {
        Some(session) if session.is_terminal() => Err(ApiError::Conflict(format!(
            "Session {} already finished",
            session_id
        ))),
        Some(_) => {
            // Persisted as running but no token; the process restarted
            warn!(session_id = %session_id, "Cancel requested for orphaned session");
            Err(ApiError::Conflict(format!(
                "Session {} is no longer running",
                session_id
            )))
        }
        None => Err(ApiError::NotFound(format!(
            "Session not found: {}",
            session_id
        ))),
    }
}

/// GET /scan/report
///
/// Report of the most recent scan that produced one.
pub async fn latest_scan_report(State(state): State<AppState>) -> ApiResult<Json<ReportResponse>> {
    let (session_id, report) = db::sessions::latest_report(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No finished scan yet".to_string()))?;
    Ok(Json(ReportResponse { session_id, report }))
}

/// Build scan workflow routes
pub fn scan_routes() -> Router<AppState> {
    Router::new()
        .route("/scan/start", post(start_scan))
        .route("/scan/status/:session_id", get(scan_status))
        .route("/scan/cancel/:session_id", post(cancel_scan))
        .route("/scan/report", get(latest_scan_report))
}
