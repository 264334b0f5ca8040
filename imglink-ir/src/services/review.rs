//! Candidate review workflow
//!
//! Approvals and rejections are one-shot: a candidate leaves pending exactly
//! once. The pending precondition is enforced in SQL (update guarded on
//! status) so concurrent reviewers cannot both win.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db;
use crate::models::{CandidateStatus, ImageCandidate, ImageLink};

const DUPLICATE_LINK_REASON: &str = "product already has an active image link";

/// Review workflow errors
#[derive(Debug, Error)]
pub enum ReviewError {
    /// No candidate with this id exists
    #[error("Candidate not found: {0}")]
    NotFound(Uuid),

    /// Candidate already left the pending state
    #[error("Candidate {id} already reviewed ({status})")]
    AlreadyReviewed { id: Uuid, status: CandidateStatus },

    /// The product acquired an active link since the candidate was created
    #[error("Product {product_id} already has an active image link")]
    DuplicateLink { product_id: Uuid },

    /// Underlying storage failure
    #[error("Database error: {0}")]
    Database(#[from] imglink_common::Error),
}

/// One-shot approve/reject operations over pending candidates
pub struct CandidateReviewService {
    db: SqlitePool,
}

impl CandidateReviewService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Promote a pending candidate to an active image link
    ///
    /// The link inherits the candidate's confidence and is marked as
    /// operator-approved rather than auto-matched. When the product gained
    /// an active link since the candidate was created, the candidate is
    /// rejected with a recorded reason instead.
    pub async fn approve(&self, candidate_id: Uuid) -> Result<ImageLink, ReviewError> {
        let candidate = self.load_pending(candidate_id).await?;

        // Re-check the one-active-link invariant at review time; the scan
        // that created this candidate may be long past.
        if db::links::has_active_link(&self.db, candidate.product_id).await? {
            self.reject_as_duplicate(&candidate).await?;
            return Err(ReviewError::DuplicateLink {
                product_id: candidate.product_id,
            });
        }

        // Claim the candidate before creating the link
        let changed = db::candidates::update_status(
            &self.db,
            candidate_id,
            CandidateStatus::Approved,
            None,
        )
        .await?;
        if changed == 0 {
            return Err(self.already_reviewed(candidate_id).await);
        }

        match db::links::insert(
            &self.db,
            candidate.product_id,
            &candidate.image_url,
            candidate.confidence,
            false,
            &candidate.source_filename,
        )
        .await
        {
            Ok(link) => {
                info!(
                    candidate_id = %candidate_id,
                    product_id = %candidate.product_id,
                    image_url = %candidate.image_url,
                    "Candidate approved, link created"
                );
                Ok(link)
            }
            Err(e) => {
                // Lost the race against another link writer; the partial
                // unique index rejected the insert. Back the approval out.
                warn!(
                    candidate_id = %candidate_id,
                    product_id = %candidate.product_id,
                    error = %e,
                    "Link insert lost active-link race, rejecting candidate"
                );
                db::candidates::overwrite_status(
                    &self.db,
                    candidate_id,
                    CandidateStatus::Rejected,
                    Some(DUPLICATE_LINK_REASON),
                )
                .await?;
                Err(ReviewError::DuplicateLink {
                    product_id: candidate.product_id,
                })
            }
        }
    }

    /// Reject a pending candidate, optionally recording a reason
    pub async fn reject(
        &self,
        candidate_id: Uuid,
        reason: Option<&str>,
    ) -> Result<ImageCandidate, ReviewError> {
        // Existence check gives a precise 404 before the guarded update
        let candidate = db::candidates::get(&self.db, candidate_id)
            .await?
            .ok_or(ReviewError::NotFound(candidate_id))?;
        if candidate.status.is_terminal() {
            return Err(ReviewError::AlreadyReviewed {
                id: candidate_id,
                status: candidate.status,
            });
        }

        let changed =
            db::candidates::update_status(&self.db, candidate_id, CandidateStatus::Rejected, reason)
                .await?;
        if changed == 0 {
            return Err(self.already_reviewed(candidate_id).await);
        }

        debug!(candidate_id = %candidate_id, reason = ?reason, "Candidate rejected");

        db::candidates::get(&self.db, candidate_id)
            .await?
            .ok_or(ReviewError::NotFound(candidate_id))
    }

    async fn load_pending(&self, candidate_id: Uuid) -> Result<ImageCandidate, ReviewError> {
        let candidate = db::candidates::get(&self.db, candidate_id)
            .await?
            .ok_or(ReviewError::NotFound(candidate_id))?;
        if candidate.status.is_terminal() {
            return Err(ReviewError::AlreadyReviewed {
                id: candidate_id,
                status: candidate.status,
            });
        }
        Ok(candidate)
    }

    async fn reject_as_duplicate(&self, candidate: &ImageCandidate) -> Result<(), ReviewError> {
        let changed = db::candidates::update_status(
            &self.db,
            candidate.id,
            CandidateStatus::Rejected,
            Some(DUPLICATE_LINK_REASON),
        )
        .await?;
        if changed == 0 {
            return Err(self.already_reviewed(candidate.id).await);
        }
        Ok(())
    }

    /// Resolve which terminal state won a lost pending race
    async fn already_reviewed(&self, candidate_id: Uuid) -> ReviewError {
        match db::candidates::get(&self.db, candidate_id).await {
            Ok(Some(candidate)) => ReviewError::AlreadyReviewed {
                id: candidate_id,
                status: candidate.status,
            },
            Ok(None) => ReviewError::NotFound(candidate_id),
            Err(e) => ReviewError::Database(e),
        }
    }
}
