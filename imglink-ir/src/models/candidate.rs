//! Persisted review candidates and image links

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Review state of an image candidate
///
/// `Approved` and `Rejected` are terminal; no further transition is valid
/// from either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    /// Awaiting human decision
    Pending,
    /// Promoted to an image link by a reviewer
    Approved,
    /// Declined by a reviewer
    Rejected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Approved => "approved",
            CandidateStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CandidateStatus::Pending),
            "approved" => Some(CandidateStatus::Approved),
            "rejected" => Some(CandidateStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal states accept no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, CandidateStatus::Approved | CandidateStatus::Rejected)
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A medium-confidence proposed image-to-product link awaiting human decision
///
/// Created only by the scan orchestrator when a match score falls in the
/// review band; mutated exactly once by a reviewer action, then immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    /// Match score (0-100) at scan time
    pub confidence: u8,
    /// Code that produced the match
    pub extracted_code: String,
    /// Filename the code was extracted from
    pub source_filename: String,
    /// Free-form scan metadata (JSON)
    pub metadata: serde_json::Value,
    pub status: CandidateStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A confirmed image-to-product link
///
/// Created once, by either the orchestrator (auto) or the review workflow
/// (on approval), and not otherwise mutated by this service. A product has
/// at most one active link at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageLink {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: String,
    /// Match score (0-100) at creation time
    pub confidence: u8,
    /// True when created by the orchestrator without review
    pub auto_matched: bool,
    /// Filename the link was derived from
    pub source_filename: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            CandidateStatus::Pending,
            CandidateStatus::Approved,
            CandidateStatus::Rejected,
        ] {
            assert_eq!(CandidateStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CandidateStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!CandidateStatus::Pending.is_terminal());
        assert!(CandidateStatus::Approved.is_terminal());
        assert!(CandidateStatus::Rejected.is_terminal());
    }
}
