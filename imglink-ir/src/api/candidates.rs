//! Candidate review endpoints
//!
//! Endpoints:
//! - GET /candidates - List pending candidates, filterable by product and text
//! - POST /candidates/:id/approve - Promote a candidate to an active link
//! - POST /candidates/:id/reject - Reject a candidate with an optional reason

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{ImageCandidate, ImageLink};
use crate::services::{CandidateReviewService, ReviewError};
use crate::AppState;

/// Query parameters for GET /candidates
#[derive(Debug, Default, Deserialize)]
pub struct ListCandidatesQuery {
    /// Only candidates for this product
    pub product_id: Option<Uuid>,
    /// Free-text filter over source filename and extracted code
    pub search: Option<String>,
}

/// Request body for POST /candidates/:id/reject
#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

/// GET /candidates
pub async fn list_candidates(
    State(state): State<AppState>,
    Query(query): Query<ListCandidatesQuery>,
) -> ApiResult<Json<Vec<ImageCandidate>>> {
    let candidates = db::candidates::list_pending(
        &state.db,
        query.product_id,
        query.search.as_deref().filter(|s| !s.trim().is_empty()),
    )
    .await?;
    Ok(Json(candidates))
}

/// POST /candidates/:id/approve
///
/// One-shot: only a pending candidate can be approved. When the product
/// gained an active link since the candidate was created, the candidate is
/// rejected instead and 409 is returned.
pub async fn approve_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
) -> ApiResult<Json<ImageLink>> {
    let service = CandidateReviewService::new(state.db.clone());
    let link = service
        .approve(candidate_id)
        .await
        .map_err(review_error_to_api)?;
    info!(candidate_id = %candidate_id, link_id = %link.id, "Candidate approved");
    Ok(Json(link))
}

/// POST /candidates/:id/reject
pub async fn reject_candidate(
    State(state): State<AppState>,
    Path(candidate_id): Path<Uuid>,
    body: Option<Json<RejectRequest>>,
) -> ApiResult<Json<ImageCandidate>> {
    let reason = body.and_then(|Json(r)| r.reason);
    let service = CandidateReviewService::new(state.db.clone());
    let candidate = service
        .reject(candidate_id, reason.as_deref())
        .await
        .map_err(review_error_to_api)?;
    info!(candidate_id = %candidate_id, "Candidate rejected");
    Ok(Json(candidate))
}

fn review_error_to_api(err: ReviewError) -> ApiError {
    match err {
        ReviewError::NotFound(id) => ApiError::NotFound(format!("Candidate not found: {}", id)),
        ReviewError::AlreadyReviewed { .. } => ApiError::Conflict(err.to_string()),
        ReviewError::DuplicateLink { .. } => ApiError::Conflict(err.to_string()),
        ReviewError::Database(e) => ApiError::Common(e),
    }
}

/// Build candidate review routes
pub fn candidate_routes() -> Router<AppState> {
    Router::new()
        .route("/candidates", get(list_candidates))
        .route("/candidates/:id/approve", post(approve_candidate))
        .route("/candidates/:id/reject", post(reject_candidate))
}
