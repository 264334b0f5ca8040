//! Scan workflow state machine
//!
//! A scan session progresses through:
//! INITIALIZING → SCANNING → PROCESSING → COMPLETED
//! with CANCELLED and FAILED as alternative terminal states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{MatchPolicy, ScanReport};

/// Scan workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanState {
    /// Catalog load and index construction
    Initializing,
    /// Image store traversal, file discovery
    Scanning,
    /// Per-image extraction, scoring, and persistence
    Processing,
    /// Scan finished successfully
    Completed,
    /// Scan cancelled by operator
    Cancelled,
    /// Scan failed with a fatal error
    Failed,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub session_id: Uuid,
    pub old_state: ScanState,
    pub new_state: ScanState,
    pub transitioned_at: DateTime<Utc>,
}

/// Scan session (in-memory state, persisted between batches)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSession {
    /// Unique session identifier
    pub session_id: Uuid,

    /// Current workflow state
    pub state: ScanState,

    /// Image store folder being scanned
    pub root_folder: String,

    /// Policy parameters this scan runs under
    pub policy: MatchPolicy,

    /// Progress tracking
    pub progress: ScanProgress,

    /// Final report (populated when the run finishes)
    pub report: Option<ScanReport>,

    /// Session start time
    pub started_at: DateTime<Utc>,

    /// Session end time (if completed/cancelled/failed)
    pub ended_at: Option<DateTime<Utc>>,
}

/// Progress tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Images processed so far
    pub current: usize,

    /// Total images discovered
    pub total: usize,

    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,

    /// Current operation description
    pub current_operation: String,

    /// Filename currently being processed
    pub current_file: Option<String>,

    /// Elapsed time (seconds)
    pub elapsed_seconds: u64,
}

impl ScanSession {
    /// Create new scan session
    pub fn new(root_folder: String, policy: MatchPolicy) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            state: ScanState::Initializing,
            root_folder,
            policy,
            progress: ScanProgress::default(),
            report: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: ScanState) -> StateTransition {
        let transition = StateTransition {
            session_id: self.session_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        // Set end time for terminal states
        match new_state {
            ScanState::Completed | ScanState::Cancelled | ScanState::Failed => {
                self.ended_at = Some(Utc::now());
            }
            _ => {}
        }

        transition
    }

    /// Update progress
    pub fn update_progress(&mut self, current: usize, total: usize, operation: String) {
        self.progress.current = current;
        self.progress.total = total;
        self.progress.percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        self.progress.current_operation = operation;
        self.progress.elapsed_seconds = (Utc::now() - self.started_at).num_seconds() as u64;
    }

    /// Check if session is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ScanState::Completed | ScanState::Cancelled | ScanState::Failed
        )
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            current: 0,
            total: 0,
            percentage: 0.0,
            current_operation: String::from("Initializing..."),
            current_file: None,
            elapsed_seconds: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_initializing() {
        let session = ScanSession::new("images".to_string(), MatchPolicy::default());
        assert_eq!(session.state, ScanState::Initializing);
        assert!(session.ended_at.is_none());
        assert!(!session.is_terminal());
    }

    #[test]
    fn test_terminal_transition_sets_end_time() {
        let mut session = ScanSession::new("images".to_string(), MatchPolicy::default());
        let transition = session.transition_to(ScanState::Completed);
        assert_eq!(transition.old_state, ScanState::Initializing);
        assert_eq!(transition.new_state, ScanState::Completed);
        assert!(session.ended_at.is_some());
        assert!(session.is_terminal());
    }

    #[test]
    fn test_progress_percentage() {
        let mut session = ScanSession::new("images".to_string(), MatchPolicy::default());
        session.update_progress(25, 100, "Processing".to_string());
        assert!((session.progress.percentage - 25.0).abs() < f64::EPSILON);

        session.update_progress(0, 0, "Empty".to_string());
        assert_eq!(session.progress.percentage, 0.0);
    }

    #[test]
    fn test_state_serialization_uppercase() {
        let json = serde_json::to_string(&ScanState::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
    }
}
