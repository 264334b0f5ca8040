//! Throttled progress event emission
//!
//! Lifecycle events (started, completed, failed, cancelled) always go out.
//! Progress snapshots are throttled to at most one per interval; each
//! snapshot carries full state, so dropped snapshots lose nothing.

use imglink_common::events::{EventBus, ScanEvent};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default minimum interval between progress snapshots
pub const DEFAULT_THROTTLE_MS: u64 = 500;

/// Event emitter wrapping the shared bus with progress throttling
pub struct ProgressBroadcaster {
    event_bus: EventBus,
    last_progress: Option<Instant>,
    throttle_interval_ms: u64,
}

impl ProgressBroadcaster {
    pub fn new(event_bus: EventBus, throttle_interval_ms: u64) -> Self {
        Self {
            event_bus,
            last_progress: None,
            throttle_interval_ms,
        }
    }

    /// Emit an event, throttling progress snapshots
    ///
    /// Returns true if the event was sent, false if throttled.
    pub fn emit(&mut self, event: ScanEvent) -> bool {
        if matches!(event, ScanEvent::ScanProgressUpdate { .. }) {
            if let Some(last) = self.last_progress {
                if last.elapsed() < Duration::from_millis(self.throttle_interval_ms) {
                    debug!(
                        elapsed_ms = last.elapsed().as_millis() as u64,
                        "Throttled progress snapshot"
                    );
                    return false;
                }
            }
            self.last_progress = Some(Instant::now());
        }

        self.event_bus.emit_lossy(event);
        true
    }

    /// Emit an event bypassing throttling
    ///
    /// Used for lifecycle events and for the final progress snapshot of a
    /// run, which must always reach subscribers.
    pub fn emit_immediate(&mut self, event: ScanEvent) {
        if matches!(event, ScanEvent::ScanProgressUpdate { .. }) {
            self.last_progress = Some(Instant::now());
        }
        self.event_bus.emit_lossy(event);
    }
}
