//! HTTP API endpoints for imglink-ir

pub mod candidates;
pub mod health;
pub mod scan;
pub mod sse;

pub use candidates::candidate_routes;
pub use health::health_routes;
pub use scan::scan_routes;
pub use sse::scan_event_stream;
