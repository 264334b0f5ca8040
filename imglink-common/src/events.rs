//! Event types for the IMGLINK event system
//!
//! Provides shared event definitions and the EventBus used by the
//! reconciliation service and any SSE consumers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// IMGLINK event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All scan-related events use this central enum for type
/// safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// Reconciliation scan session started
    ///
    /// Triggers:
    /// - SSE: Show progress panel
    ScanSessionStarted {
        /// Session UUID
        session_id: Uuid,
        /// Folder being scanned
        root_folder: String,
        /// When the scan started
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Incremental scan progress snapshot
    ///
    /// Each snapshot is a full state replacement, not a delta; consumers
    /// may drop intermediate snapshots without losing information.
    ///
    /// Triggers:
    /// - SSE: Update progress bar and counters
    ScanProgressUpdate {
        /// Session UUID
        session_id: Uuid,
        /// Current workflow state (serialized ScanState)
        status: String,
        /// Human-readable description of the current step
        current_step: String,
        /// Images processed so far
        processed: usize,
        /// Images resolved to a link or candidate
        successful: usize,
        /// Images that failed with an error
        failed: usize,
        /// Images skipped (already linked, duplicate link)
        skipped: usize,
        /// Total images discovered
        total: usize,
        /// Filename currently being processed
        current_file: Option<String>,
        /// Capped sample of error messages so far
        errors: Vec<String>,
        /// Snapshot timestamp
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scan session finished successfully
    ///
    /// Triggers:
    /// - SSE: Show final report, close progress panel
    ScanSessionCompleted {
        /// Session UUID
        session_id: Uuid,
        /// Total images examined
        total_images: usize,
        /// Direct links created without review
        direct_links_created: usize,
        /// Review candidates created
        candidates_created: usize,
        /// Images left unresolved
        unresolved: usize,
        /// Wall-clock processing time
        processing_time_ms: u64,
        /// When the scan completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scan session failed with a fatal error
    ///
    /// Triggers:
    /// - SSE: Show error state
    ScanSessionFailed {
        /// Session UUID
        session_id: Uuid,
        /// Error description
        error: String,
        /// When the failure occurred
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Scan session cancelled by an operator
    ///
    /// Triggers:
    /// - SSE: Show cancelled state with partial counts
    ScanSessionCancelled {
        /// Session UUID
        session_id: Uuid,
        /// Images processed before cancellation
        processed: usize,
        /// Total images discovered
        total: usize,
        /// When the cancellation took effect
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ScanEvent {
    /// Get event type as string for SSE filtering
    pub fn event_type(&self) -> &str {
        match self {
            ScanEvent::ScanSessionStarted { .. } => "ScanSessionStarted",
            ScanEvent::ScanProgressUpdate { .. } => "ScanProgressUpdate",
            ScanEvent::ScanSessionCompleted { .. } => "ScanSessionCompleted",
            ScanEvent::ScanSessionFailed { .. } => "ScanSessionFailed",
            ScanEvent::ScanSessionCancelled { .. } => "ScanSessionCancelled",
        }
    }

    /// Session this event belongs to
    pub fn session_id(&self) -> Uuid {
        match self {
            ScanEvent::ScanSessionStarted { session_id, .. }
            | ScanEvent::ScanProgressUpdate { session_id, .. }
            | ScanEvent::ScanSessionCompleted { session_id, .. }
            | ScanEvent::ScanSessionFailed { session_id, .. }
            | ScanEvent::ScanSessionCancelled { session_id, .. } => *session_id,
        }
    }
}

/// Central event distribution bus for scan events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScanEvent,
    ) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Useful for progress snapshots where it is acceptable if no component
    /// is currently listening.
    pub fn emit_lossy(&self, event: ScanEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
